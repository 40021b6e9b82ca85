//! OpenAPI documentation for the gallery, contact, auth and admin endpoints, served at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    api::{
        handlers::{auth, contact, works},
        models::{
            auth::{AuthResponse, LoginRequest, MagicLinkRequest, SessionResponse},
            contact::{ContactRequest, ContactResponse},
            works::{RemoveImageRequest, ReorderWorksRequest, ReorderWorksResponse, WorkResponse, WorkUpdate},
        },
    },
    auth::current_user::CurrentUser,
    cleanup::{
        WorkDeletion,
        executor::{KeyOutcome, PurgeOutcome, PurgeReport},
    },
};

/// Session cookie and bearer token schemes for the admin endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "atelier_session",
                    "Session cookie set by `/auth/login` or the magic link callback.",
                ))),
            );
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token issued by the auth provider:\n\n\
                            ```\nAuthorization: Bearer ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        works::list_public_works,
        works::get_public_work,
        works::list_categories,
        contact::send_contact,
        auth::magic_link,
        auth::login,
        auth::callback,
        auth::logout,
        auth::session,
        works::list_works,
        works::create_work,
        works::get_work,
        works::update_work,
        works::delete_work,
        works::add_images,
        works::remove_image,
        works::reorder_works,
        works::list_tags,
    ),
    components(schemas(
        WorkResponse,
        WorkUpdate,
        RemoveImageRequest,
        ReorderWorksRequest,
        ReorderWorksResponse,
        WorkDeletion,
        PurgeReport,
        KeyOutcome,
        PurgeOutcome,
        ContactRequest,
        ContactResponse,
        MagicLinkRequest,
        LoginRequest,
        AuthResponse,
        SessionResponse,
        CurrentUser,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "gallery", description = "Published works, readable without signing in."),
        (name = "contact", description = "The public contact form."),
        (name = "auth", description = "Sign in with a magic link or password, and manage the session cookie."),
        (name = "works", description = "Create, edit, reorder and delete works. Requires an admin session."),
    ),
    info(
        title = "Atelier API",
        version = "1.0.0",
        description = "Portfolio gallery and content management.

## Authentication

Admin endpoints under `/admin/api` accept either the session cookie set at sign-in or an
`Authorization: Bearer` header carrying the same access token. Only the configured admin
addresses are let through.

## Errors

Errors are returned as `{\"message\": \"...\"}` with a matching HTTP status.",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_admin_and_public_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in ["/api/works", "/api/contact", "/auth/callback", "/admin/api/works/{id}/images", "/admin/api/works/order"] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}: {paths:?}");
        }

        let components = doc.components.expect("components are generated");
        assert!(components.security_schemes.contains_key("CookieAuth"));
        assert!(components.security_schemes.contains_key("BearerAuth"));
    }
}
