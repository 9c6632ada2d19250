// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use siteshot::domain::models::asset::{AssetFormat, AssetType};
use siteshot::domain::models::credential::{AuthMethod, CredentialRecord, PasswordCredentials};
use siteshot::engines::session::BrowserSession;
use siteshot::engines::traits::EngineError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::helpers::{png, session_options, FakeEngine, FakeSite, LOGIN_FORM};

const LOGIN_URL: &str = "https://app.example.com/login";
const TIMEOUT: Duration = Duration::from_secs(5);

async fn open(engine: &FakeEngine, url: &str) -> BrowserSession {
    let mut session = BrowserSession::new(Arc::new(engine.clone()), session_options());
    session.open(url, TIMEOUT).await.unwrap();
    session
}

fn oauth(provider: &str, fallback: Option<(&str, &str)>) -> CredentialRecord {
    CredentialRecord::new(
        "app",
        AuthMethod::OAuth {
            provider: provider.to_string(),
            fallback: fallback.map(|(u, p)| PasswordCredentials {
                username: u.to_string(),
                password: p.to_string(),
            }),
        },
    )
}

#[tokio::test]
async fn test_email_login_fills_form_and_leaves_login_page() {
    let engine = FakeEngine::new().with_site(
        LOGIN_URL,
        FakeSite::new(LOGIN_FORM).redirect_after_submit("https://app.example.com/dashboard"),
    );
    let mut session = open(&engine, LOGIN_URL).await;

    let credential = CredentialRecord::email("app", "me@example.com", "hunter2");
    assert!(session.authenticate(&credential).await.unwrap());

    let actions = engine.actions();
    assert!(actions.contains(&"fill input[type=email]=me@example.com".to_string()));
    assert!(actions.contains(&"fill input[type=password]=hunter2".to_string()));
    assert!(actions.contains(&"click button[type=submit]".to_string()));

    session.close().await;
    session.close().await;
    assert_eq!(engine.closed(), 1);
}

#[tokio::test]
async fn test_email_login_skips_hidden_decoy_input() {
    let html = r#"<html><body><form action="/session">
        <input type="email" name="trap" tabindex="-1" style="display: none">
        <input type="email" name="email">
        <input type="password" name="password">
        <button type="submit">Sign in</button>
      </form></body></html>"#;
    let engine = FakeEngine::new().with_site(
        LOGIN_URL,
        FakeSite::new(html).redirect_after_submit("https://app.example.com/dashboard"),
    );
    let session = open(&engine, LOGIN_URL).await;

    let credential = CredentialRecord::email("app", "me@example.com", "hunter2");
    assert!(session.authenticate(&credential).await.unwrap());

    let fills: Vec<String> = engine
        .actions()
        .into_iter()
        .filter(|a| a.starts_with("fill"))
        .collect();
    assert_eq!(
        fills,
        vec![
            "fill input[type=email] >> nth=1=me@example.com".to_string(),
            "fill input[type=password]=hunter2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_login_that_stays_on_login_page_reports_false() {
    let engine = FakeEngine::new().with_site(LOGIN_URL, FakeSite::new(LOGIN_FORM));
    let session = open(&engine, LOGIN_URL).await;

    let credential = CredentialRecord::email("app", "me@example.com", "wrong");
    assert!(!session.authenticate(&credential).await.unwrap());
}

#[tokio::test]
async fn test_empty_credential_is_rejected() {
    let engine = FakeEngine::new().with_site(LOGIN_URL, FakeSite::new(LOGIN_FORM));
    let session = open(&engine, LOGIN_URL).await;

    let err = session
        .authenticate(&CredentialRecord::email("app", "", ""))
        .await
        .unwrap_err();
    match err {
        EngineError::InvalidCredential(e) => assert_eq!(e.violations().len(), 2),
        other => panic!("unexpected error {:?}", other),
    }
    // 不应触碰页面
    assert!(!engine.actions().iter().any(|a| a.starts_with("fill")));
}

#[tokio::test]
async fn test_missing_login_field_is_field_not_found() {
    let engine = FakeEngine::new().with_site(
        LOGIN_URL,
        FakeSite::new("<html><body><p>No form here</p></body></html>"),
    );
    let session = open(&engine, LOGIN_URL).await;

    let err = session
        .authenticate(&CredentialRecord::email("app", "u", "p"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::FieldNotFound(ref f) if f == "username"));
}

#[tokio::test]
async fn test_oauth_clicks_provider_button_by_text() {
    let html = r#"<html><body><button>Continue with Google</button></body></html>"#;
    let engine = FakeEngine::new().with_site(
        LOGIN_URL,
        FakeSite::new(html).redirect_after_submit("https://app.example.com/home"),
    );
    let session = open(&engine, LOGIN_URL).await;

    assert!(session.authenticate(&oauth("Google", None)).await.unwrap());
    assert!(engine
        .actions()
        .contains(&"click text Continue with Google".to_string()));
}

#[tokio::test]
async fn test_oauth_provider_selector_wins_over_text() {
    let html = r#"<html><body><a data-provider="github" href="/auth/github">GitHub</a></body></html>"#;
    let engine = FakeEngine::new().with_site(
        LOGIN_URL,
        FakeSite::new(html).redirect_after_submit("https://github.com/login/oauth/authorize"),
    );
    let session = open(&engine, LOGIN_URL).await;

    // 停留在授权页视为未完成
    assert!(!session.authenticate(&oauth("github", None)).await.unwrap());
    assert!(engine
        .actions()
        .contains(&"click [data-provider='github']".to_string()));
}

#[tokio::test]
async fn test_oauth_falls_back_to_password_login() {
    let engine = FakeEngine::new().with_site(
        LOGIN_URL,
        FakeSite::new(LOGIN_FORM).redirect_after_submit("https://app.example.com/dashboard"),
    );
    let session = open(&engine, LOGIN_URL).await;

    let credential = oauth("google", Some(("me@example.com", "hunter2")));
    assert!(session.authenticate(&credential).await.unwrap());
    assert!(engine
        .actions()
        .contains(&"fill input[type=password]=hunter2".to_string()));
}

#[tokio::test]
async fn test_oauth_without_fallback_is_field_not_found() {
    let engine = FakeEngine::new().with_site(LOGIN_URL, FakeSite::new(LOGIN_FORM));
    let session = open(&engine, LOGIN_URL).await;

    let err = session.authenticate(&oauth("google", None)).await.unwrap_err();
    assert!(matches!(err, EngineError::FieldNotFound(ref f) if f.contains("google")));
}

#[tokio::test]
async fn test_sso_fills_named_fields() {
    let html = r#"<html><body><form>
        <input name="tenant"><input id="domain">
        <button type="submit">Sign in</button>
      </form></body></html>"#;
    let engine = FakeEngine::new().with_site(
        "https://corp.example.com/sso",
        FakeSite::new(html).redirect_after_submit("https://corp.example.com/portal"),
    );
    let session = open(&engine, "https://corp.example.com/sso").await;

    let mut fields = BTreeMap::new();
    fields.insert("tenant".to_string(), "acme".to_string());
    fields.insert("domain".to_string(), "acme.example".to_string());
    let credential = CredentialRecord::new("corp", AuthMethod::Sso { fields });

    assert!(session.authenticate(&credential).await.unwrap());
    let actions = engine.actions();
    assert!(actions.contains(&"fill input[name='tenant']=acme".to_string()));
    assert!(actions.contains(&"fill input[id='domain']=acme.example".to_string()));
}

#[tokio::test]
async fn test_manual_method_is_not_automated() {
    let engine = FakeEngine::new().with_site(LOGIN_URL, FakeSite::new(LOGIN_FORM));
    let session = open(&engine, LOGIN_URL).await;

    let credential = CredentialRecord::new(
        "app",
        AuthMethod::Manual {
            fields: BTreeMap::new(),
        },
    );
    assert!(matches!(
        session.authenticate(&credential).await,
        Err(EngineError::NotAutomated(_))
    ));
}

#[tokio::test]
async fn test_open_dismisses_consent_gate() {
    let html = r#"<html><body><div class="cookie"><button>Reject</button><button>Accept all</button></div></body></html>"#;
    let engine = FakeEngine::new().with_site("https://news.example.com/", FakeSite::new(html));

    open(&engine, "https://news.example.com/").await;
    assert!(engine.actions().contains(&"click text Accept all".to_string()));
}

#[tokio::test]
async fn test_open_rejects_non_http_url() {
    let engine = FakeEngine::new();
    let mut session = BrowserSession::new(Arc::new(engine.clone()), session_options());

    let err = session.open("ftp://files.example.com", TIMEOUT).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidUrl(_)));
    assert_eq!(engine.opened(), 0);
}

#[tokio::test]
async fn test_locate_favicon_prefers_declared_icon() {
    let html = r#"<html><head>
        <link rel="apple-touch-icon" href="/apple.png">
        <link rel="icon" href="/static/icon.png">
      </head><body></body></html>"#;
    let engine = FakeEngine::new().with_site(
        "https://shop.example.com/",
        FakeSite::new(html)
            .resource("https://shop.example.com/static/icon.png", png(48, 48))
            .resource("https://shop.example.com/apple.png", png(180, 180)),
    );
    let session = open(&engine, "https://shop.example.com/").await;

    let asset = session
        .locate_asset(AssetType::Favicon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.format, AssetFormat::Png);
    assert_eq!(asset.data, png(48, 48));
}

#[tokio::test]
async fn test_locate_favicon_skips_svg_and_uses_default_path() {
    let html = r#"<html><head><link rel="icon" href="/icon.svg"></head></html>"#;
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"></svg>"#;
    let engine = FakeEngine::new().with_site(
        "https://blog.example.com/",
        FakeSite::new(html)
            .resource("https://blog.example.com/icon.svg", svg.to_vec())
            .resource("https://blog.example.com/favicon.ico", png(16, 16)),
    );
    let session = open(&engine, "https://blog.example.com/").await;

    let asset = session
        .locate_asset(AssetType::Favicon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(asset.format, AssetFormat::Png);
    assert!(engine
        .actions()
        .contains(&"fetch https://blog.example.com/favicon.ico".to_string()));
}

#[tokio::test]
async fn test_locate_logo_downloads_svg_source() {
    let html = r#"<html><body><header><img class="site-logo" src="/brand/logo.svg"></header></body></html>"#;
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 120 40"></svg>"#;
    let engine = FakeEngine::new().with_site(
        "https://brand.example.com/",
        FakeSite::new(html).resource("https://brand.example.com/brand/logo.svg", svg.to_vec()),
    );
    let session = open(&engine, "https://brand.example.com/").await;

    let asset = session.locate_asset(AssetType::Logo).await.unwrap().unwrap();
    assert_eq!(asset.format, AssetFormat::Svg);
    assert_eq!(asset.data, svg.to_vec());
}

#[tokio::test]
async fn test_locate_logo_screenshots_raster_element() {
    let html = r#"<html><body><header><img class="logo" src="/logo.png"></header></body></html>"#;
    let engine = FakeEngine::new().with_site("https://raster.example.com/", FakeSite::new(html));
    let session = open(&engine, "https://raster.example.com/").await;

    let asset = session.locate_asset(AssetType::Logo).await.unwrap().unwrap();
    assert_eq!(asset.format, AssetFormat::Png);
    assert!(engine
        .actions()
        .contains(&"element screenshot header img[class*=logo]".to_string()));
}

#[tokio::test]
async fn test_locate_logo_missing_is_none() {
    let engine = FakeEngine::new().with_site(
        "https://plain.example.com/",
        FakeSite::new("<html><body><p>text</p></body></html>"),
    );
    let session = open(&engine, "https://plain.example.com/").await;

    assert!(session.locate_asset(AssetType::Logo).await.unwrap().is_none());
}
