use axum::response::Html;

const FORM_PAGE: &str = include_str!("form.html");

pub async fn form() -> Html<&'static str> {
  Html(FORM_PAGE)
}
