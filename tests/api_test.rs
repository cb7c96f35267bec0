//! End-to-end tests: the real router on an ephemeral port, driven over HTTP.

use nebob::config::Config;
use nebob::db;
use nebob::routes;
use nebob::state::{AppState, DbPool};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use rusqlite::params;
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestServer {
    base: String,
    pool: DbPool,
    client: Client,
    _data_dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let data_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.resolve_paths(data_dir.path());
        config.auth.bcrypt_cost = 4;
        std::fs::create_dir_all(config.uploads_path()).unwrap();

        let pool = db::create_pool(&config.db_path()).unwrap();
        db::run_migrations(&pool).unwrap();

        let state = AppState::new(pool.clone(), config).unwrap();
        let app = routes::app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            pool,
            client: Client::new(),
            _data_dir: data_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn signup_form(&self, form: Form) -> reqwest::Response {
        self.client
            .post(self.url("/users"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    /// Sign up a site account and return its access token.
    async fn signup(&self, nickname: &str, region: &str) -> String {
        let resp = self.signup_form(site_form(nickname, region)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    fn insert_restaurant(&self, name: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.execute(
            "INSERT INTO restaurants (name, address, category) VALUES (?1, 'Mapo-gu 12', 'korean')",
            params![name],
        )
        .unwrap();
        conn.last_insert_rowid()
    }
}

fn site_form(nickname: &str, region: &str) -> Form {
    Form::new()
        .text("email", format!("{}@example.com", nickname))
        .text("password", "hunter22")
        .text("nickName", nickname.to_string())
        .text("region", region.to_string())
        .text("birthdate", "1995/04/12")
}

fn review_form(taste: &str) -> Form {
    Form::new()
        .text("isCarVisit", "true")
        .text("carVisitAbility", "3")
        .text("taste", taste.to_string())
        .text("service", "3")
        .text("restroomCleanliness", "2")
        .text("overallExperience", "Would come back")
}

fn nicknames(list: &Value) -> Vec<&str> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|u| u["nickName"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn signup_issues_tokens_and_my_info_reflects_account() {
    let server = TestServer::start().await;
    let token = server.signup("alice", "Seoul").await;

    let (status, body) = server.get("/users/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["message"], "Success");
    assert_eq!(body["data"]["nickName"], "alice");
    assert_eq!(body["data"]["follower"], 0);
    assert_eq!(body["data"]["restaurantCount"], 0);
    assert!(body["data"]["profileImage"]
        .as_str()
        .unwrap()
        .ends_with("profile/images/defaultprofile.png"));

    let (_, body) = server.get("/users/me/detail", &token).await;
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert_eq!(body["data"]["provider"], "site");
    assert_eq!(body["data"]["birthdate"], "1995/04/12");
}

#[tokio::test]
async fn duplicate_nickname_is_a_conflict_envelope() {
    let server = TestServer::start().await;
    server.signup("alice", "Seoul").await;

    let form = site_form("alice", "Busan").text("email", "other@example.com");
    let resp = server.signup_form(form).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["statusCode"], 409);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn invalid_signup_fields_are_rejected() {
    let server = TestServer::start().await;

    let resp = server
        .signup_form(site_form("two words", "Seoul"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = server
        .signup_form(site_form("carol", "Seoul").text("birthdate", "1995/02/30"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn nicknames_shadowed_by_user_routes_are_refused() {
    let server = TestServer::start().await;

    for reserved in ["me", "search", "recommendations"] {
        let resp = server.signup_form(site_form(reserved, "Seoul")).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", reserved);
    }

    let resp = server
        .client
        .get(server.url("/users/nickname-availability?value=search"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn availability_checks_are_public() {
    let server = TestServer::start().await;
    server.signup("alice", "Seoul").await;

    let taken: Value = server
        .client
        .get(server.url("/users/nickname-availability?value=alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(taken["data"]["isUnique"], false);

    let free: Value = server
        .client
        .get(server.url("/users/email-availability?value=bob@example.com"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(free["data"]["isUnique"], true);
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let server = TestServer::start().await;

    let resp = server
        .client
        .get(server.url("/users/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = server.get("/users/me", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn follow_lists_carry_follow_flags() {
    let server = TestServer::start().await;
    let alice = server.signup("alice", "Seoul").await;
    let bob = server.signup("bob", "Seoul").await;
    server.signup("carol", "Busan").await;

    let (status, _) = server.post("/users/bob/follow", &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = server.post("/users/bob/follow", &alice).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, following) = server.get("/users/me/following", &alice).await;
    assert_eq!(nicknames(&following["data"]), vec!["bob"]);
    assert_eq!(following["data"][0]["isFollow"], true);

    let (_, followers) = server.get("/users/me/followers", &bob).await;
    assert_eq!(nicknames(&followers["data"]), vec!["alice"]);
    assert_eq!(followers["data"][0]["isFollow"], false);

    let (_, target) = server.get("/users/bob", &alice).await;
    assert_eq!(target["data"]["isFollow"], true);

    let (_, recs) = server.get("/users/recommendations", &alice).await;
    assert_eq!(nicknames(&recs["data"]), vec!["carol"]);
    assert_eq!(recs["data"][0]["isFollow"], false);

    let (status, _) = server.delete("/users/bob/follow", &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.delete("/users/bob/follow", &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (_, following) = server.get("/users/me/following", &alice).await;
    assert!(following["data"].as_array().unwrap().is_empty());

    let (status, _) = server.post("/users/alice/follow", &alice).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = server.post("/users/ghost/follow", &alice).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_filters_by_fragment_and_region() {
    let server = TestServer::start().await;
    let me = server.signup("kimme", "Seoul").await;
    server.signup("kimseoul", "Seoul").await;
    server.signup("kimbusan", "Busan").await;
    server.signup("leejeju", "Jeju").await;

    let (_, body) = server.get("/users/search?nickname=kim&region=Seoul", &me).await;
    assert_eq!(nicknames(&body["data"]), vec!["kimseoul"]);

    let (_, body) = server
        .get("/users/search?nickname=kim&region=Seoul,Busan", &me)
        .await;
    assert_eq!(nicknames(&body["data"]), vec!["kimbusan", "kimseoul"]);

    let (_, body) = server.get("/users/search?nickname=e", &me).await;
    assert_eq!(nicknames(&body["data"]), vec!["kimseoul", "leejeju"]);
}

#[tokio::test]
async fn partial_profile_update_keeps_other_fields() {
    let server = TestServer::start().await;
    let token = server.signup("alice", "Seoul").await;

    let resp = server
        .client
        .put(server.url("/users/me"))
        .bearer_auth(&token)
        .multipart(Form::new().text("nickName", "alicia"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["nickName"], "alicia");
    assert_eq!(body["data"]["region"], "Seoul");
    assert!(body["data"]["profileImage"]
        .as_str()
        .unwrap()
        .ends_with("defaultprofile.png"));

    // password untouched
    let resp = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "alice@example.com", "password": "hunter22" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn profile_image_upload_is_served_back() {
    let server = TestServer::start().await;
    let token = server.signup("alice", "Seoul").await;

    let image = Part::bytes(b"\x89PNG fake".to_vec()).file_name("me.png");
    let resp = server
        .client
        .put(server.url("/users/me"))
        .bearer_auth(&token)
        .multipart(
            Form::new()
                .text("isImageChanged", "true")
                .part("profileImage", image),
        )
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let url = body["data"]["profileImage"].as_str().unwrap().to_string();
    let key = url
        .strip_prefix("http://localhost:8000/images/")
        .unwrap()
        .to_string();
    assert!(key.starts_with("profile/images/"));

    let resp = server
        .client
        .get(server.url(&format!("/images/{}", key)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"\x89PNG fake");

    let resp = server
        .client
        .get(server.url("/images/profile/images/missing.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restaurant_lists_pick_the_most_liked_image() {
    let server = TestServer::start().await;
    let alice = server.signup("alice", "Seoul").await;
    let bob = server.signup("bob", "Seoul").await;
    let pictured = server.insert_restaurant("Jinju Naengmyeon");
    let plain = server.insert_restaurant("Corner Bakery");

    let photo = Part::bytes(b"png bytes".to_vec()).file_name("dish.png");
    let resp = server
        .client
        .post(server.url(&format!("/users/me/restaurants/{}", pictured)))
        .bearer_auth(&alice)
        .multipart(review_form("4").part("reviewImage", photo))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    let review_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["taste"], 4);
    assert!(body["data"]["reviewImage"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:8000/images/review/images/"));
    assert!(body["data"].get("userId").is_none());

    let resp = server
        .client
        .post(server.url(&format!("/users/me/restaurants/{}", plain)))
        .bearer_auth(&alice)
        .multipart(review_form("2"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server
        .client
        .post(server.url(&format!("/reviews/{}/like", review_id)))
        .bearer_auth(&bob)
        .json(&json!({ "isLike": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, body) = server.get("/users/me/restaurants?sort=name", &alice).await;
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["name"], "Corner Bakery");
    assert_eq!(
        list[0]["reviewImage"],
        "http://localhost:8000/images/review/images/defaultImage.png"
    );
    assert_eq!(list[1]["name"], "Jinju Naengmyeon");
    assert_eq!(list[1]["reviewCount"], 1);
    assert_eq!(list[1]["isMy"], true);
    assert!(list[1]["reviewImage"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:8000/images/review/images/"));

    // bob sees alice's list without any restaurant of his own
    let (_, target) = server.get("/users/alice", &bob).await;
    let restaurants = target["data"]["restaurants"].as_array().unwrap();
    assert_eq!(restaurants.len(), 2);
    assert!(restaurants.iter().all(|r| r["isMy"] == false));

    let (_, info) = server.get("/users/me", &alice).await;
    assert_eq!(info["data"]["restaurantCount"], 2);

    let (status, _) = server
        .delete(&format!("/users/me/restaurants/{}", plain), &alice)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get("/users/me/restaurants", &alice).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn visiting_unknown_restaurant_is_not_found() {
    let server = TestServer::start().await;
    let alice = server.signup("alice", "Seoul").await;

    let resp = server
        .client
        .post(server.url("/users/me/restaurants/999"))
        .bearer_auth(&alice)
        .multipart(review_form("3"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = server
        .client
        .post(server.url("/reviews/999/like"))
        .bearer_auth(&alice)
        .json(&json!({ "isLike": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recommended_restaurants_match_favourite_category_nearby() {
    let server = TestServer::start().await;
    let alice = server.signup("alice", "Mapo").await;
    let visited = server.insert_restaurant("Gukbap Corner");
    let fresh = server.insert_restaurant("Mandu House");

    let (_, body) = server.get("/users/me/recommended-restaurants", &alice).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let resp = server
        .client
        .post(server.url(&format!("/users/me/restaurants/{}", visited)))
        .bearer_auth(&alice)
        .multipart(review_form("3"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let (status, body) = server.get("/users/me/recommended-restaurants", &alice).await;
    assert_eq!(status, StatusCode::OK);
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["restaurantId"], fresh);
    assert_eq!(list[0]["isMy"], false);
    assert_eq!(
        list[0]["reviewImage"],
        "http://localhost:8000/images/review/images/defaultImage.png"
    );
}

#[tokio::test]
async fn wish_list_round_trip() {
    let server = TestServer::start().await;
    let alice = server.signup("alice", "Seoul").await;
    let r = server.insert_restaurant("Dream Sushi");
    let path = format!("/users/me/restaurants/wish/{}", r);

    let (_, body) = server.get(&path, &alice).await;
    assert_eq!(body["data"]["isWish"], false);

    let (status, _) = server.post(&path, &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.post(&path, &alice).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = server.get(&path, &alice).await;
    assert_eq!(body["data"]["isWish"], true);

    let (_, body) = server.get("/users/me/restaurants/wish", &alice).await;
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["name"], "Dream Sushi");
    assert_eq!(list[0]["reviewCount"], 0);
    assert_eq!(list[0]["isMy"], false);

    let (status, _) = server.delete(&path, &alice).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get("/users/me/restaurants/wish", &alice).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() {
    let server = TestServer::start().await;
    server.signup("alice", "Seoul").await;

    let resp = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "alice@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let login: Value = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "alice@example.com", "password": "hunter22" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let refresh_token = login["data"]["refreshToken"].as_str().unwrap().to_string();

    let resp = server
        .client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated: Value = resp.json().await.unwrap();
    let access = rotated["data"]["accessToken"].as_str().unwrap().to_string();

    // consumed
    let resp = server
        .client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "refreshToken": refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = server.post("/auth/logout", &access).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.get("/users/me", &access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleting_account_revokes_access() {
    let server = TestServer::start().await;
    let alice = server.signup("alice", "Seoul").await;

    let (status, body) = server.delete("/users/me", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, _) = server.get("/users/me", &alice).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
