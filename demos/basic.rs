use request_client::{ClientConfig, RequestClient, RequestOptions, Response};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("REQUEST_CLIENT_BASE_URL")
        .unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let client = RequestClient::new(
        ClientConfig::new(base_url)
            .with_header("accept", "application/json")
            .with_retry(2, 250),
    )?;

    client.add_request_interceptor(|options: RequestOptions| async move {
        options.with_header("x-demo", "basic")
    });
    client.add_response_interceptor(|response: Response| async move {
        println!("<- {} {}", response.status, response.url);
        response
    });

    let cached = RequestOptions::new()
        .with_param("name", "kit")
        .with_cache(true);
    let first = client.get("/get", cached.clone()).await?;
    let second = client.get("/get", cached).await?;
    println!("cache hit returned identical data: {}", first.data == second.data);

    let created = client
        .post("/post", json!({ "name": "kit" }), RequestOptions::new())
        .await?;
    println!("{:?}", created.data);

    Ok(())
}
