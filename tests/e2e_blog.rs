/// E2E tests for the core blog flows
/// These tests run against a real server instance
use reqwest::Client;

const BASE_URL: &str = "http://localhost:3000";

fn unique_username(prefix: &str) -> String {
    let suffix = uuid::Uuid::now_v7().simple().to_string();
    format!("{}{}", prefix, &suffix[..12])
}

/// Sign up a fresh user and log in so the client's cookie store holds a session.
async fn signup_and_login(
    client: &Client,
    username: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    client
        .post(format!("{}/auth/signup/", BASE_URL))
        .form(&[("username", username), ("password", "password123")])
        .send()
        .await?;

    let response = client
        .post(format!("{}/auth/login/", BASE_URL))
        .form(&[("username", username), ("password", "password123")])
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(format!("login failed with {}", response.status()).into());
    }
    Ok(())
}

#[tokio::test]
#[ignore] // Run with: cargo test --test e2e_blog -- --ignored
async fn test_homepage_loads() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder().cookie_store(true).build()?;

    let response = client.get(format!("{}/", BASE_URL)).send().await?;

    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert!(body.contains("Latest posts"));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_signup_and_publish_post() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder().cookie_store(true).build()?;
    let username = unique_username("writer");
    signup_and_login(&client, &username).await?;

    let text = format!("e2e post {}", uuid::Uuid::now_v7());
    let form = reqwest::multipart::Form::new()
        .text("text", text.clone())
        .text("group", "");
    let response = client
        .post(format!("{}/create/", BASE_URL))
        .multipart(form)
        .send()
        .await?;

    // The redirect to the author profile is followed automatically
    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert!(body.contains(&username));
    assert!(body.contains(&text));

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_create_requires_login() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let response = client.get(format!("{}/create/", BASE_URL)).send().await?;

    assert_eq!(response.status(), 303);
    let location = response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(location, "/auth/login/?next=/create/");

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_follow_puts_author_in_feed() -> Result<(), Box<dyn std::error::Error>> {
    let author_client = Client::builder().cookie_store(true).build()?;
    let author = unique_username("author");
    signup_and_login(&author_client, &author).await?;

    let text = format!("feed post {}", uuid::Uuid::now_v7());
    let form = reqwest::multipart::Form::new()
        .text("text", text.clone())
        .text("group", "");
    author_client
        .post(format!("{}/create/", BASE_URL))
        .multipart(form)
        .send()
        .await?;

    let reader_client = Client::builder().cookie_store(true).build()?;
    let reader = unique_username("reader");
    signup_and_login(&reader_client, &reader).await?;

    reader_client
        .get(format!("{}/profile/{}/follow/", BASE_URL, author))
        .send()
        .await?;

    let response = reader_client
        .get(format!("{}/follow/", BASE_URL))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body = response.text().await?;
    assert!(body.contains(&text));

    Ok(())
}
