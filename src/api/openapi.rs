use super::handlers::{health, tickets, validate};
use utoipa::{
    OpenApi,
    openapi::{Contact, License},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        tickets::create_granting_ticket,
        tickets::create_service_ticket,
        tickets::destroy_granting_ticket,
        validate::validate,
    ),
    components(schemas(health::Health)),
    tags(
        (name = "tickets", description = "REST ticket API for non-browser clients"),
        (name = "validate", description = "CAS 1.0 service ticket validation"),
        (name = "health", description = "Liveness and store reachability"),
    )
)]
struct ApiDoc;

/// `OpenAPI` document for the machine-facing endpoints, titled from Cargo
/// metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, rest)) => (
            optional_str(name.trim()),
            rest.split_once('>').and_then(|(email, _)| optional_str(email.trim())),
        ),
        None => (optional_str(author.trim()), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}
