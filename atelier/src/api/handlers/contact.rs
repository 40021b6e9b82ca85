use axum::{Json, extract::State};
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::contact::{ContactRequest, ContactResponse},
    email::ContactMessage,
    errors::Error,
};

/// Relay a contact form message to the artist
#[utoipa::path(
    post,
    path = "/api/contact",
    tag = "contact",
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Message sent", body = ContactResponse),
        (status = 400, description = "Missing fields or invalid email address"),
        (status = 500, description = "The message could not be delivered"),
    )
)]
#[instrument(skip_all)]
pub async fn send_contact(State(state): State<AppState>, Json(request): Json<ContactRequest>) -> Result<Json<ContactResponse>, Error> {
    let message = ContactMessage::try_from(request)?;
    state.email.send_contact_email(&message).await?;
    info!("Relayed contact message from {}", message.email);
    Ok(Json(ContactResponse { ok: true }))
}
