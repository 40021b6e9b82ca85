use crate::email::ContactMessage;
use crate::errors::Error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A message from the public contact form
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactRequest {
    #[schema(example = "Ana")]
    pub name: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    pub message: String,
}

impl TryFrom<ContactRequest> for ContactMessage {
    type Error = Error;

    /// All three fields are required once trimmed
    fn try_from(request: ContactRequest) -> Result<Self, Self::Error> {
        let missing = [("name", &request.name), ("email", &request.email), ("message", &request.message)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(Error::BadRequest {
                message: format!("Missing required fields: {}", missing.join(", ")),
            });
        }

        Ok(ContactMessage {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            message: request.message.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    pub ok: bool,
}
