//! Common test utilities and fixtures.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use aq_protocol_saml::signature::{SignatureMethod, SigningContext, XmlSigner};
use aq_protocol_saml::soap::wrap_soap;
use aq_protocol_saml::xml::Document;
use aq_protocol_saml::{
    Assertion, Attribute, AttributeQuery, AttributeStatement, AttributeValue, Conditions,
    IdpMetadata, Issuer, Response, ServiceProvider, ServiceProviderConfig, Subject,
    SubjectConfirmation, SubjectConfirmationData,
};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use chrono::{Duration, Utc};
use rcgen::{generate_simple_self_signed, CertifiedKey};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Entity ID of the stub identity provider.
pub const IDP_ENTITY_ID: &str = "https://idp.example.com";

/// Entity ID of the service provider under test.
pub const SP_ENTITY_ID: &str = "https://sp.example.com";

/// How the stub attribute authority answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// A signed, valid answer.
    Answer,
    /// An empty body with this HTTP status.
    HttpStatus(u16),
    /// A signed answer whose attribute value is altered afterwards.
    Tamper,
    /// A response issued by another entity.
    ForeignIssuer,
    /// A response whose root carries the `ID` attribute twice.
    DuplicateAttribute,
}

/// Key material and certificate of one party.
pub struct Credentials {
    /// PEM private key.
    pub key_pem: String,
    /// PEM certificate.
    pub cert_pem: String,
    /// DER certificate.
    pub cert_der: Vec<u8>,
}

impl Credentials {
    /// Generates a self-signed P-256 key pair.
    pub fn generate(host: &str) -> anyhow::Result<Self> {
        let CertifiedKey { cert, key_pair } =
            generate_simple_self_signed(vec![host.to_string()])?;
        Ok(Self {
            key_pem: key_pair.serialize_pem(),
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
        })
    }
}

struct StubState {
    signer: XmlSigner,
    behavior: Behavior,
    directory: BTreeMap<String, Vec<Attribute>>,
    requests: Mutex<Vec<String>>,
}

/// An attribute authority served by axum on a loopback port.
pub struct AttributeAuthority {
    /// URL of the SOAP attribute service.
    pub url: String,
    /// Metadata describing this authority.
    pub metadata: IdpMetadata,
    state: Arc<StubState>,
    _shutdown_tx: oneshot::Sender<()>,
}

impl AttributeAuthority {
    /// Starts an authority that answers with `behavior`.
    pub async fn start(behavior: Behavior) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("aq_protocol_saml=debug")
            .try_init();

        let credentials = Credentials::generate("idp.example.com")?;
        let signer = XmlSigner::from_pem(&credentials.key_pem, Some(&credentials.cert_pem))?;

        let mut directory = BTreeMap::new();
        directory.insert(
            "user@example.com".to_string(),
            vec![
                Attribute::single("eduPersonPrincipalName", "jdoe"),
                Attribute::single("mail", "jdoe@example.com"),
                Attribute::new("eduPersonAffiliation")
                    .with_value(AttributeValue::string("staff"))
                    .with_value(AttributeValue::string("member")),
            ],
        );

        let state = Arc::new(StubState {
            signer,
            behavior,
            directory,
            requests: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/aa", listener.local_addr()?);
        let metadata = IdpMetadata::new(IDP_ENTITY_ID, url.clone())
            .with_signing_certificate(&credentials.cert_der);

        let app = Router::new()
            .route("/aa", post(attribute_service))
            .with_state(state.clone());

        let (_shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!("attribute authority error: {}", e);
            }
        });

        Ok(Self {
            url,
            metadata,
            state,
            _shutdown_tx,
        })
    }

    /// Returns the request bodies received so far.
    pub fn requests(&self) -> Vec<String> {
        self.state
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Builds a service provider pointed at this authority.
    pub fn service_provider(
        &self,
        config: ServiceProviderConfig,
    ) -> anyhow::Result<ServiceProvider> {
        Ok(ServiceProvider::new(config, self.metadata.clone())?)
    }
}

/// SP configuration without signing.
pub fn sp_config() -> ServiceProviderConfig {
    ServiceProviderConfig::new(SP_ENTITY_ID)
}

/// SP configuration signing queries with `credentials`.
pub fn signing_sp_config(credentials: &Credentials) -> ServiceProviderConfig {
    ServiceProviderConfig {
        signature_method: Some(SignatureMethod::EcdsaSha256.uri().to_string()),
        private_key_pem: Some(credentials.key_pem.clone()),
        certificate_pem: Some(credentials.cert_pem.clone()),
        ..sp_config()
    }
}

/// Extracts the attribute query from a SOAP request body.
pub fn parse_query(body: &str) -> anyhow::Result<AttributeQuery> {
    let document = Document::parse(body.as_bytes())?;
    let (element, _) = document
        .find_path(&["Envelope", "Body", "AttributeQuery"])
        .ok_or_else(|| anyhow::anyhow!("no AttributeQuery in request"))?;
    Ok(AttributeQuery::from_element(element)?)
}

async fn attribute_service(
    State(state): State<Arc<StubState>>,
    body: String,
) -> axum::response::Response {
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(body.clone());
    }

    if let Behavior::HttpStatus(code) = state.behavior {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return status.into_response();
    }

    match answer(&state, &body) {
        Ok(xml) => ([(header::CONTENT_TYPE, "text/xml")], xml).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

fn answer(state: &StubState, body: &str) -> anyhow::Result<String> {
    let query = parse_query(body)?;
    let name_id = query
        .subject
        .name_id
        .clone()
        .ok_or_else(|| anyhow::anyhow!("query has no NameID"))?;
    let now = Utc::now();

    let known = state.directory.get(&name_id.value).cloned().unwrap_or_default();
    let attributes = known
        .into_iter()
        .filter(|a| {
            query.attributes.is_empty() || query.attributes.iter().any(|q| q.name == a.name)
        })
        .fold(AttributeStatement::new(), AttributeStatement::with_attribute);

    let issuer = Issuer::entity(IDP_ENTITY_ID);
    let assertion = Assertion::new(aq_crypto::generate_request_id(), issuer, now)
        .with_subject(Subject::new(name_id).with_confirmation(
            SubjectConfirmation::bearer().with_data(SubjectConfirmationData::for_request(
                query.id.clone(),
                now + Duration::minutes(5),
            )),
        ))
        .with_conditions(
            Conditions::with_validity(now, now + Duration::minutes(5))
                .with_audience(query.issuer.value.clone()),
        )
        .with_attribute_statement(attributes);
    let signed = state.signer.sign_enveloped(&assertion.to_element())?;

    let issuer = match state.behavior {
        Behavior::ForeignIssuer => "https://evil.example.com",
        _ => IDP_ENTITY_ID,
    };
    let response_id = aq_crypto::generate_request_id();
    let response = Response::success(response_id, Issuer::entity(issuer), query.id, now)
        .to_element()
        .with_child(signed);
    let xml = wrap_soap(response).to_xml()?;

    Ok(match state.behavior {
        Behavior::Tamper => xml.replace(">jdoe<", ">root<"),
        Behavior::DuplicateAttribute => {
            xml.replacen("<samlp:Response ", "<samlp:Response ID=\"dup\" ", 1)
        }
        _ => xml,
    })
}
