use cookie_session::{CookieJar, SessionConfig, SessionManager, SessionResult};
use tracing_subscriber::EnvFilter;

async fn run_inmemory_demo() -> SessionResult<()> {
    println!("== In-memory session demo ==");
    let manager = SessionManager::new(
        SessionConfig::new()
            .with_cookie_name("demo_session")
            .with_signing_secret("change-me"),
    )
    .await?;

    // first request: no cookie, a session is issued
    let mut login = CookieJar::new();
    let session = manager.start(&mut login).await?;
    session.set("user", "user-123");
    session.save().await?;
    for header in login.set_cookie_headers() {
        println!("Set-Cookie: {header}");
    }

    // second request carries the cookie back
    let mut next = login.follow_up();
    let session = manager.start(&mut next).await?;
    println!(
        "Loaded user: {}",
        session.get_str("user").unwrap_or_else(|| "<none>".into())
    );

    // rotate the identifier, e.g. after a privilege change
    let mut rotate = next.follow_up();
    let session = manager.refresh(&mut rotate).await?;
    println!("Rotated session, user still {:?}", session.get_str("user"));

    let mut logout = rotate.follow_up();
    manager.destroy(&mut logout).await?;
    for header in logout.set_cookie_headers() {
        println!("Set-Cookie: {header}");
    }

    manager.close().await
}

#[tokio::main]
async fn main() -> SessionResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    run_inmemory_demo().await
}
