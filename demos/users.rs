use hyper::{Body, Request, StatusCode};
use log::info;
use rroute::{get_param, Json, Params, Router};
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Deserialize, Serialize)]
struct User {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct Post {
    user_id: String,
    post_id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

fn user(req: Request<Body>) -> Json<User> {
    let id = get_param(&req, "id");

    Json(User {
        id: id.to_string(),
        name: format!("user-{}", id),
    })
}

fn post(Params(params): Params) -> Json<Post> {
    Json(Post {
        user_id: params.get("userId").unwrap_or_default().to_string(),
        post_id: params.get("postId").unwrap_or_default().to_string(),
        title: "hello".into(),
    })
}

fn create_user(Json(new_user): Json<NewUser>) -> (StatusCode, Json<User>) {
    info!("creating user {}", new_user.name);

    (
        StatusCode::CREATED,
        Json(User {
            id: "1".into(),
            name: new_user.name,
        }),
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let addr = std::env::var("RROUTE_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());

    Router::default()
        .get("/users/:id", user)
        .get("/users/:userId/posts/:postId", post)
        .post("/users", create_user)
        .start(&addr)
}
