// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 候选定位器
//!
//! 每组候选是按优先级排列的 CSS 选择器，在页面 HTML 快照上求值，
//! 第一个命中的候选胜出。这里的函数都是纯函数，不持有浏览器状态。

use scraper::{ElementRef, Html, Selector};

use crate::engines::traits::ElementTarget;

/// 用户名输入框候选
pub const USERNAME_CANDIDATES: &[&str] = &[
    "input[type=email]",
    "input[name=email]",
    "input[name=username]",
    "input[id=username]",
    "input[name=login]",
    "input[autocomplete=username]",
    "input[id*=email]",
    "input[id*=user]",
    "input[name*=user]",
    "input[type=text]",
];

/// 密码输入框候选
pub const PASSWORD_CANDIDATES: &[&str] = &[
    "input[type=password]",
    "input[name=password]",
    "input[id*=password]",
];

/// 提交按钮候选
pub const SUBMIT_CANDIDATES: &[&str] = &[
    "button[type=submit]",
    "input[type=submit]",
    "button[name=login]",
    "button[id*=login]",
    "button[class*=login]",
    "button[id*=signin]",
    "form button",
];

/// 年龄验证、Cookie 同意等拦截层的按钮文本，按优先级排列
pub const GATE_BUTTON_TEXTS: &[&str] = &[
    "Accept all",
    "Accept all cookies",
    "Allow all",
    "Accept",
    "I agree",
    "Agree",
    "I am over 18",
    "I'm over 18",
    "Enter",
    "Continue",
    "Got it",
    "OK",
];

/// Logo 候选，页眉与导航区域优先
pub const LOGO_CANDIDATES: &[&str] = &[
    "header img[class*=logo]",
    "header img[alt*=logo]",
    "header img[alt*=Logo]",
    "header img[id*=logo]",
    "header img[src*=logo]",
    "nav img[class*=logo]",
    "nav img[alt*=logo]",
    "nav img[alt*=Logo]",
    "header [class*=logo] img",
    "nav [class*=logo] img",
    "header svg[class*=logo]",
    "header [class*=logo] svg",
    "a[class*=logo] img",
    "img[class*=logo]",
    "img[id*=logo]",
    "img[alt*=logo]",
    "img[alt*=Logo]",
    "img[src*=logo]",
    "svg[class*=logo]",
    "[class*=logo] svg",
    "header a[href='/'] img",
    "header a[href='/'] svg",
];

/// 登录页 URL 特征
const LOGIN_URL_MARKERS: &[&str] = &["login", "signin"];
/// OAuth 授权页 URL 特征
const AUTH_URL_MARKERS: &[&str] = &["oauth", "authorize", "/auth"];

/// 命中的 Logo 元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoMatch {
    /// 命中的可见元素，可直接用于元素截图
    pub target: ElementTarget,
    /// `img` 元素的 src 属性
    pub src: Option<String>,
}

/// 返回第一个在快照中存在可见元素的候选
///
/// 结果指向该候选命中的第一个可见元素，排在它前面的隐藏元素不会被选中。
pub fn first_match<S: AsRef<str>>(html: &str, candidates: &[S]) -> Option<ElementTarget> {
    let document = Html::parse_document(html);
    candidates.iter().find_map(|candidate| {
        let selector = Selector::parse(candidate.as_ref()).ok()?;
        let index = document.select(&selector).position(is_visible)?;
        Some(ElementTarget::new(candidate.as_ref(), index))
    })
}

/// 查找拦截层按钮
///
/// 返回第一个在页面中出现的候选文本（按候选顺序，而不是文档顺序）。
pub fn gate_button_text(html: &str) -> Option<&'static str> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(
        "button, a, [role=button], input[type=submit], input[type=button]",
    )
    .ok()?;

    let labels: Vec<String> = document
        .select(&selector)
        .filter(|el| is_visible(*el))
        .map(control_label)
        .filter(|label| !label.is_empty())
        .collect();

    GATE_BUTTON_TEXTS
        .iter()
        .copied()
        .find(|candidate| labels.iter().any(|l| l.eq_ignore_ascii_case(candidate)))
}

/// 第三方登录按钮的选择器候选
///
/// 提供方名称只允许字母、数字、`-` 和 `_`，其余情况返回空列表。
pub fn oauth_provider_selectors(provider: &str) -> Vec<String> {
    let provider = provider.trim().to_ascii_lowercase();
    if provider.is_empty()
        || !provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Vec::new();
    }
    vec![
        format!("[data-provider='{}']", provider),
        format!("button[data-provider*='{}']", provider),
        format!("a[data-provider*='{}']", provider),
        format!("a[href*='/auth/{}']", provider),
        format!("a[href*='{}']", provider),
        format!("button[class*='{}']", provider),
    ]
}

/// 第三方登录按钮的文本候选
pub fn oauth_provider_texts(provider: &str) -> Vec<String> {
    let provider = provider.trim();
    vec![
        format!("Continue with {}", provider),
        format!("Sign in with {}", provider),
        format!("Log in with {}", provider),
        format!("Login with {}", provider),
        provider.to_string(),
    ]
}

/// SSO 字段的选择器候选
pub fn named_field_selectors(name: &str) -> Vec<String> {
    let name = name.replace('\'', "");
    vec![
        format!("input[name='{}']", name),
        format!("input[id='{}']", name),
        format!("select[name='{}']", name),
        format!("input[placeholder='{}']", name),
    ]
}

/// 查找 Logo
pub fn find_logo(html: &str) -> Option<LogoMatch> {
    let document = Html::parse_document(html);
    LOGO_CANDIDATES.iter().find_map(|candidate| {
        let selector = Selector::parse(candidate).ok()?;
        let (index, element) = document
            .select(&selector)
            .enumerate()
            .find(|(_, el)| is_visible(*el))?;
        Some(LogoMatch {
            target: ElementTarget::new(*candidate, index),
            src: element
                .value()
                .attr("src")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    })
}

/// 页面声明的图标地址，`icon` / `shortcut icon` 优先于 `apple-touch-icon`
pub fn favicon_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("link[rel][href]") else {
        return Vec::new();
    };

    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    for link in document.select(&selector) {
        let rel = link.value().attr("rel").unwrap_or_default().to_ascii_lowercase();
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = rel.split_whitespace().collect();
        if tokens.contains(&"icon") {
            primary.push(href.to_string());
        } else if tokens
            .iter()
            .any(|t| *t == "apple-touch-icon" || *t == "apple-touch-icon-precomposed")
        {
            secondary.push(href.to_string());
        }
    }
    primary.extend(secondary);
    primary
}

/// URL 是否仍像登录页
pub fn looks_like_login_url(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    LOGIN_URL_MARKERS.iter().any(|m| url.contains(m))
}

/// URL 是否仍像登录页或 OAuth 授权页
pub fn looks_like_auth_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    looks_like_login_url(&lower) || AUTH_URL_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_visible(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if value.attr("hidden").is_some() {
        return false;
    }
    if value.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("hidden")) {
        return false;
    }
    if value.attr("aria-hidden") == Some("true") {
        return false;
    }
    match value.attr("style") {
        Some(style) => {
            let style: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            !style.contains("display:none") && !style.contains("visibility:hidden")
        }
        None => true,
    }
}

fn control_label(element: ElementRef<'_>) -> String {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        element
            .value()
            .attr("value")
            .or_else(|| element.value().attr("aria-label"))
            .unwrap_or_default()
            .trim()
            .to_string()
    } else {
        text
    }
}
