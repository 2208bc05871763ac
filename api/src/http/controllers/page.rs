use axum::response::Html;

#[allow(clippy::unused_async)]
pub async fn show() -> Html<&'static str> {
    Html(include_str!("../../../assets/index.html"))
}
