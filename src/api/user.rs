use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            message::Message,
            user::{
                hash_password, Credentials, LoggedIn, PasswordChange, SignedUp, UserDescription,
                UserSpec,
            },
        },
        db::user::{NewUser, Role, User},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![signup, login, profile, change_password, logout]
}

#[post("/signup", data = "<spec>", format = "json")]
pub async fn signup(
    spec: Json<UserSpec>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    new_users: Coll<NewUser>,
    config: &State<Config>,
) -> Result<Json<SignedUp>> {
    let user: NewUser = spec.into_inner().try_into()?;

    // There is only ever one admin.
    if user.role == Role::Admin {
        let existing = users.find_one(doc! { "role": Role::Admin }, None).await?;
        if existing.is_some() {
            return Err(Error::BadRequest("Admin user already exists".to_string()));
        }
    }

    let id: Id = new_users
        .insert_one(&user, None)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::BadRequest(format!("Username already in use: {}", user.username))
            } else {
                err.into()
            }
        })?
        .inserted_id
        .as_object_id()
        .ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                "Inserted user has no ObjectId".to_string(),
            )
        })?
        .into();
    info!("User {id} signed up as {}", user.role);

    let user = User { id, user };
    let token = AuthToken::new(&user).encode(config)?;
    cookies.add(AuthToken::cookie(token.clone(), config));

    Ok(Json(SignedUp {
        response: user.into(),
        token,
    }))
}

#[post("/login", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: Json<Credentials>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<LoggedIn>> {
    let with_username = doc! {
        "username": &credentials.username,
    };

    let user = users
        .find_one(with_username, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| Error::Unauthorized("Invalid username or password".to_string()))?;

    let token = AuthToken::new(&user).encode(config)?;
    cookies.add(AuthToken::cookie(token.clone(), config));

    Ok(Json(LoggedIn { token }))
}

#[get("/profile")]
pub async fn profile(token: AuthToken, users: Coll<User>) -> Result<Json<UserDescription>> {
    let user = users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;
    Ok(Json(user.into()))
}

#[put("/profile/password", data = "<change>", format = "json")]
pub async fn change_password(
    token: AuthToken,
    change: Json<PasswordChange>,
    users: Coll<User>,
) -> Result<Json<Message>> {
    let user = users
        .find_one(token.id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("user not found"))?;

    if !user.verify_password(&change.current_password) {
        return Err(Error::Unauthorized("Invalid current password".to_string()));
    }

    let update = doc! {
        "$set": {
            "passwordHash": hash_password(&change.new_password)?,
        }
    };
    users.update_one(token.id.as_doc(), update, None).await?;
    info!("User {} changed their password", token.id);

    Ok(Json(Message::new("Password updated")))
}

#[delete("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;

    async fn sign_up(client: &Client, spec: UserSpec) -> rocket::local::asynchronous::LocalResponse<'_> {
        client
            .post("/user/signup")
            .header(ContentType::JSON)
            .body(json!(spec).to_string())
            .dispatch()
            .await
    }

    #[backend_test]
    async fn signup_creates_voter(client: Client, users: Coll<User>) {
        let response = sign_up(&client, UserSpec::example()).await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let raw = response.into_string().await.unwrap();
        assert!(!raw.contains("passwordHash"));
        let signed_up: SignedUp = rocket::serde::json::serde_json::from_str(&raw).unwrap();
        assert_eq!(signed_up.response.role, Role::Voter);
        assert!(!signed_up.response.is_voted);

        let id: Id = signed_up.response.id.parse().unwrap();
        let stored = users.find_one(id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.username, UserSpec::example().username);
        assert!(stored.verify_password(&UserSpec::example().password));

        // The returned token identifies the new user.
        let response = client
            .get("/user/profile")
            .header(Header::new("Authorization", format!("Bearer {}", signed_up.token)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let profile: UserDescription = response.into_json().await.unwrap();
        assert_eq!(profile, signed_up.response);
    }

    #[backend_test]
    async fn duplicate_username(client: Client, users: Coll<User>) {
        assert_eq!(Status::Ok, sign_up(&client, UserSpec::example()).await.status());
        assert_eq!(
            Status::BadRequest,
            sign_up(&client, UserSpec::example()).await.status()
        );
        assert_eq!(users.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn only_one_admin(client: Client, users: Coll<User>) {
        assert_eq!(
            Status::Ok,
            sign_up(&client, UserSpec::example_admin()).await.status()
        );

        let second_admin = UserSpec {
            username: "another-admin".to_string(),
            ..UserSpec::example_admin()
        };
        let response = sign_up(&client, second_admin).await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            response.into_json::<rocket::serde::json::Value>().await.unwrap(),
            json!({ "error": "Admin user already exists" })
        );

        let admins = users
            .count_documents(doc! { "role": Role::Admin }, None)
            .await
            .unwrap();
        assert_eq!(admins, 1);
    }

    #[backend_test]
    async fn login_checks_password(client: Client, new_users: Coll<NewUser>) {
        new_users
            .insert_one(NewUser::example_voter(), None)
            .await
            .unwrap();

        let wrong = Credentials {
            password: "definitely wrong".to_string(),
            ..Credentials::example_voter()
        };
        let response = client
            .post("/user/login")
            .header(ContentType::JSON)
            .body(json!(wrong).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let response = client
            .post("/user/login")
            .header(ContentType::JSON)
            .body(json!(Credentials::example_voter()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test(voter)]
    async fn change_password(client: Client, db: Database) {
        let new_password = "an even better password";

        // The current password must be given correctly.
        let response = client
            .put("/user/profile/password")
            .header(ContentType::JSON)
            .body(json!({ "currentPassword": "nope", "newPassword": new_password }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // The new password must be long enough.
        let response = client
            .put("/user/profile/password")
            .header(ContentType::JSON)
            .body(
                json!({
                    "currentPassword": Credentials::example_voter().password,
                    "newPassword": "short",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .put("/user/profile/password")
            .header(ContentType::JSON)
            .body(
                json!({
                    "currentPassword": Credentials::example_voter().password,
                    "newPassword": new_password,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let user = Coll::<User>::from_db(&db)
            .find_one(doc! { "username": Credentials::example_voter().username }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.verify_password(new_password));
        assert!(!user.verify_password(Credentials::example_voter().password));
    }

    #[backend_test(admin)]
    async fn logout_removes_cookie(client: Client) {
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let response = client.delete("/user/logout").dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let response = client.get("/user/profile").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}
