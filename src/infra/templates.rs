use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use tera::{Context, Tera};

const SOURCES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    (
        "includes/header.html",
        include_str!("../../templates/includes/header.html"),
    ),
    (
        "includes/post_card.html",
        include_str!("../../templates/includes/post_card.html"),
    ),
    (
        "includes/paginator.html",
        include_str!("../../templates/includes/paginator.html"),
    ),
    (
        "posts/index.html",
        include_str!("../../templates/posts/index.html"),
    ),
    (
        "posts/group_list.html",
        include_str!("../../templates/posts/group_list.html"),
    ),
    (
        "posts/profile.html",
        include_str!("../../templates/posts/profile.html"),
    ),
    (
        "posts/post_detail.html",
        include_str!("../../templates/posts/post_detail.html"),
    ),
    (
        "posts/create_post.html",
        include_str!("../../templates/posts/create_post.html"),
    ),
    (
        "posts/follow.html",
        include_str!("../../templates/posts/follow.html"),
    ),
    (
        "about/author.html",
        include_str!("../../templates/about/author.html"),
    ),
    ("about/tech.html", include_str!("../../templates/about/tech.html")),
    (
        "users/login.html",
        include_str!("../../templates/users/login.html"),
    ),
    (
        "users/signup.html",
        include_str!("../../templates/users/signup.html"),
    ),
    (
        "users/logged_out.html",
        include_str!("../../templates/users/logged_out.html"),
    ),
    ("core/404.html", include_str!("../../templates/core/404.html")),
    ("core/500.html", include_str!("../../templates/core/500.html")),
];

static TEMPLATES: Lazy<Result<Tera, String>> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(SOURCES.iter().copied())
        .map_err(|err| format!("{:?}", err))?;
    Ok(tera)
});

/// Fails fast at start-up when a template does not parse.
pub fn ensure_loaded() -> Result<()> {
    TEMPLATES
        .as_ref()
        .map(|_| ())
        .map_err(|err| anyhow!("failed to load templates: {}", err))
}

pub fn render(name: &str, context: &Context) -> Result<String> {
    let tera = TEMPLATES
        .as_ref()
        .map_err(|err| anyhow!("failed to load templates: {}", err))?;
    tera.render(name, context)
        .map_err(|err| anyhow!("failed to render {}: {:?}", name, err))
}
