//! HTTP implementation of [`RemoteSessionClient`] for the ADT AMDP debugger API.
//!
//! The remote system binds the debug session to the HTTP session cookie, so a
//! single [`reqwest::Client`] with a cookie store must serve every call of a
//! session. Mutating requests also carry the anti-replay token.

use std::sync::LazyLock;

use amdp_protocol::{Breakpoint, SessionStatus, StatusReport, StepKind, StepOutcome, Variable};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::client::{AntiReplayToken, RemoteSession, RemoteSessionClient, SessionAffinity};
use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};

const TOKEN_HEADER: &str = "X-CSRF-Token";
const SESSIONS_PATH: [&str; 7] = ["sap", "bc", "adt", "runtime", "debugger", "amdp", "sessions"];
const DISCOVERY_PATH: [&str; 4] = ["sap", "bc", "adt", "discovery"];
const AMDP_NS: &str = "http://www.sap.com/adt/debugger/amdp";

const MIME_START_CONFIG: &str = "application/vnd.sap.adt.debugger.amdp.startconfiguration.v1+xml";
const MIME_SESSION: &str = "application/vnd.sap.adt.debugger.amdp.session.v1+xml";
const MIME_STEP_CONFIG: &str = "application/vnd.sap.adt.debugger.amdp.stepconfiguration.v1+xml";
const MIME_STEP_RESULT: &str = "application/vnd.sap.adt.debugger.amdp.stepresult.v1+xml";
const MIME_VARIABLES: &str = "application/vnd.sap.adt.debugger.amdp.variables.v1+xml";
const MIME_BREAKPOINTS: &str = "application/vnd.sap.adt.debugger.amdp.breakpoints.v1+xml";
const MIME_BREAKPOINT: &str = "application/vnd.sap.adt.debugger.amdp.breakpoint.v1+xml";

/// AMDP debugger client over HTTP.
pub struct HttpSessionClient {
	http: reqwest::Client,
	config: ClientConfig,
}

impl HttpSessionClient {
	pub fn new(config: ClientConfig) -> Result<Self> {
		Url::parse(&config.base_url)
			.map_err(|e| Error::InvalidArgument(format!("base url '{}': {e}", config.base_url)))?;

		let http = reqwest::Client::builder()
			.cookie_store(true)
			.danger_accept_invalid_certs(config.insecure)
			.timeout(config.request_timeout)
			.build()
			.map_err(transport_error)?;

		Ok(Self { http, config })
	}

	fn endpoint(&self, base: &[&str], rest: &[&str]) -> Result<Url> {
		let mut url = Url::parse(&self.config.base_url)
			.map_err(|e| Error::InvalidArgument(format!("base url: {e}")))?;
		url.path_segments_mut()
			.map_err(|_| Error::InvalidArgument("base url cannot carry a path".to_string()))?
			.pop_if_empty()
			.extend(base)
			.extend(rest);
		url.query_pairs_mut().append_pair("sap-client", &self.config.sap_client);
		Ok(url)
	}

	fn session_url(&self, main_id: &str, tail: Option<&str>) -> Result<Url> {
		match tail {
			Some(tail) => self.endpoint(&SESSIONS_PATH, &[main_id, tail]),
			None => self.endpoint(&SESSIONS_PATH, &[main_id]),
		}
	}

	fn request(&self, method: Method, url: Url, token: Option<&AntiReplayToken>) -> RequestBuilder {
		debug!(target = "amdp.http", %method, %url, "remote request");
		let builder = self.http.request(method, url);
		match token {
			Some(token) => builder.header(TOKEN_HEADER, token.as_str()),
			None => builder,
		}
	}
}

#[async_trait]
impl RemoteSessionClient for HttpSessionClient {
	async fn fetch_token(&self, credentials: &Credentials) -> Result<AntiReplayToken> {
		let url = self.endpoint(&DISCOVERY_PATH, &[])?;
		let response = self
			.request(Method::HEAD, url, None)
			.basic_auth(&credentials.user, Some(&credentials.password))
			.header(TOKEN_HEADER, "fetch")
			.send()
			.await
			.map_err(|e| Error::AuthFailure {
				status: None,
				message: e.to_string(),
			})?;

		let status = response.status();
		let token = response
			.headers()
			.get(TOKEN_HEADER)
			.and_then(|v| v.to_str().ok())
			.map(str::to_string)
			.unwrap_or_default();

		if !status.is_success() || token.is_empty() || token.eq_ignore_ascii_case("unsafe") {
			return Err(Error::AuthFailure {
				status: Some(status.as_u16()),
				message: "failed to get CSRF token".to_string(),
			});
		}

		Ok(AntiReplayToken::new(token))
	}

	async fn start_session(
		&self,
		token: &AntiReplayToken,
		object_uri: &str,
		credentials: &Credentials,
	) -> Result<RemoteSession> {
		let url = self.endpoint(&SESSIONS_PATH, &[])?;
		let body = format!(
			r#"<?xml version="1.0" encoding="UTF-8"?>
<amdp:startConfiguration xmlns:amdp="{AMDP_NS}">
  <amdp:objectUri>{}</amdp:objectUri>
  <amdp:user>{}</amdp:user>
  <amdp:terminateExisting>true</amdp:terminateExisting>
</amdp:startConfiguration>"#,
			xml_escape(object_uri),
			xml_escape(&credentials.user),
		);

		let response = self
			.request(Method::POST, url, Some(token))
			.basic_auth(&credentials.user, Some(&credentials.password))
			.header(CONTENT_TYPE, HeaderValue::from_static(MIME_START_CONFIG))
			.header(ACCEPT, HeaderValue::from_static(MIME_SESSION))
			.body(body)
			.send()
			.await
			.map_err(transport_error)?;

		let body = read_accepted(response, "start session", &[StatusCode::OK, StatusCode::CREATED]).await?;
		parse_session(&body).ok_or_else(|| Error::RemoteOperation {
			operation: "start session",
			status: None,
			body: format!("session started but failed to parse response: {body}"),
		})
	}

	async fn step(&self, session: &SessionAffinity, kind: StepKind) -> Result<StepOutcome> {
		let url = self.session_url(&session.main_id, None)?;
		let body = format!(
			r#"<?xml version="1.0" encoding="UTF-8"?>
<amdp:stepConfiguration xmlns:amdp="{AMDP_NS}">
  <amdp:stepType>{}</amdp:stepType>
</amdp:stepConfiguration>"#,
			kind.remote_name()
		);

		let response = self
			.request(Method::POST, url, Some(&session.token))
			.header(CONTENT_TYPE, HeaderValue::from_static(MIME_STEP_CONFIG))
			.header(ACCEPT, HeaderValue::from_static(MIME_STEP_RESULT))
			.body(body)
			.send()
			.await
			.map_err(transport_error)?;

		let raw = read_accepted(response, "step", &[StatusCode::OK]).await?;
		let position = parse_position(&raw);
		Ok(StepOutcome {
			status: position.status,
			line: position.line,
			procedure: position.procedure,
			raw,
		})
	}

	async fn get_status(&self, session: &SessionAffinity) -> Result<StatusReport> {
		let url = self.session_url(&session.main_id, None)?;
		let response = self
			.request(Method::GET, url, None)
			.header(ACCEPT, HeaderValue::from_static(MIME_SESSION))
			.send()
			.await
			.map_err(transport_error)?;

		let raw = read_accepted(response, "get status", &[StatusCode::OK]).await?;
		let position = parse_position(&raw);
		Ok(StatusReport {
			status: position.status,
			line: position.line,
			procedure: position.procedure,
			raw,
		})
	}

	async fn get_variables(&self, session: &SessionAffinity) -> Result<Vec<Variable>> {
		let url = self.session_url(&session.main_id, Some("variables"))?;
		let response = self
			.request(Method::GET, url, None)
			.header(ACCEPT, HeaderValue::from_static(MIME_VARIABLES))
			.send()
			.await
			.map_err(transport_error)?;

		let raw = read_accepted(response, "get variables", &[StatusCode::OK]).await?;
		Ok(parse_variables(&raw))
	}

	async fn get_breakpoints(&self, session: &SessionAffinity) -> Result<Vec<Breakpoint>> {
		let url = self.session_url(&session.main_id, Some("breakpoints"))?;
		let response = self
			.request(Method::GET, url, None)
			.header(ACCEPT, HeaderValue::from_static(MIME_BREAKPOINTS))
			.send()
			.await
			.map_err(transport_error)?;

		let raw = read_accepted(response, "get breakpoints", &[StatusCode::OK]).await?;
		Ok(parse_breakpoints(&raw))
	}

	async fn set_breakpoint(&self, session: &SessionAffinity, procedure: &str, line: u32) -> Result<()> {
		let url = self.session_url(&session.main_id, Some("breakpoints"))?;
		let body = format!(
			r#"<?xml version="1.0" encoding="UTF-8"?>
<amdp:breakpoint xmlns:amdp="{AMDP_NS}">
  <amdp:procName>{}</amdp:procName>
  <amdp:line>{line}</amdp:line>
</amdp:breakpoint>"#,
			xml_escape(procedure)
		);

		let response = self
			.request(Method::POST, url, Some(&session.token))
			.header(CONTENT_TYPE, HeaderValue::from_static(MIME_BREAKPOINT))
			.body(body)
			.send()
			.await
			.map_err(transport_error)?;

		read_accepted(response, "set breakpoint", &[StatusCode::OK, StatusCode::CREATED]).await?;
		Ok(())
	}

	async fn stop_session(&self, session: &SessionAffinity) -> Result<()> {
		let url = self.session_url(&session.main_id, None)?;
		let response = self
			.request(Method::DELETE, url, Some(&session.token))
			.send()
			.await
			.map_err(transport_error)?;

		// 404 means the remote side already dropped the session.
		read_accepted(
			response,
			"stop session",
			&[StatusCode::OK, StatusCode::NO_CONTENT, StatusCode::NOT_FOUND],
		)
		.await?;
		Ok(())
	}

	async fn hard_stop(&self, session: &SessionAffinity) {
		let mut url = match self.session_url(&session.main_id, None) {
			Ok(url) => url,
			Err(err) => {
				warn!(target = "amdp.http", error = %err, "hard stop skipped");
				return;
			}
		};
		url.query_pairs_mut().append_pair("hard_stop", "true");

		match self.request(Method::DELETE, url, Some(&session.token)).send().await {
			Ok(response) => {
				debug!(target = "amdp.http", status = response.status().as_u16(), "hard stop sent");
			}
			Err(err) => warn!(target = "amdp.http", error = %err, "hard stop failed"),
		}
	}

	async fn keepalive(&self, session: &SessionAffinity) -> Result<()> {
		let url = self.session_url(&session.main_id, None)?;
		let response = self
			.request(Method::GET, url, None)
			.send()
			.await
			.map_err(transport_error)?;
		read_accepted(response, "keepalive", &[StatusCode::OK]).await?;
		Ok(())
	}
}

fn transport_error(err: reqwest::Error) -> Error {
	Error::Transport(err.to_string())
}

/// Reads the body, failing with [`Error::RemoteOperation`] unless the status is accepted.
async fn read_accepted(
	response: reqwest::Response,
	operation: &'static str,
	accepted: &[StatusCode],
) -> Result<String> {
	let status = response.status();
	let body = response.text().await.map_err(transport_error)?;
	if accepted.contains(&status) {
		Ok(body)
	} else {
		Err(Error::RemoteOperation {
			operation,
			status: Some(status.as_u16()),
			body,
		})
	}
}

fn xml_escape(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	for c in raw.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&apos;"),
			_ => out.push(c),
		}
	}
	out
}

fn xml_unescape(raw: &str) -> String {
	raw.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&apos;", "'")
		.replace("&amp;", "&")
}

static ELEMENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)<(?:[\w.-]+:)?(variable|breakpoint)\b([^>]*?)(?:/>|>(.*?)</(?:[\w.-]+:)?(?:variable|breakpoint)>)")
		.expect("element block pattern is valid")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(?:^|\s)(?:[\w.-]+:)?([\w.-]+)\s*=\s*"([^"]*)""#).expect("attribute pattern is valid")
});

static TEXT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"<(?:[\w.-]+:)?([\w.-]+)\b[^>]*>([^<]*)</").expect("text element pattern is valid")
});

/// Value of `name` as an attribute (any prefix) or a child element.
fn field(source: &str, name: &str) -> Option<String> {
	let attribute = ATTRIBUTE
		.captures_iter(source)
		.find(|caps| &caps[1] == name)
		.map(|caps| xml_unescape(&caps[2]));
	attribute.or_else(|| {
		TEXT_ELEMENT
			.captures_iter(source)
			.find(|caps| &caps[1] == name)
			.map(|caps| xml_unescape(caps[2].trim()))
	})
}

fn first_field(source: &str, names: &[&str]) -> Option<String> {
	names.iter().find_map(|name| field(source, name))
}

fn parse_session(body: &str) -> Option<RemoteSession> {
	let session_id = field(body, "sessionId").unwrap_or_default();
	let main_id = field(body, "mainId").filter(|id| !id.is_empty())?;
	Some(RemoteSession { session_id, main_id })
}

struct Position {
	status: Option<SessionStatus>,
	line: Option<u32>,
	procedure: Option<String>,
}

fn parse_position(body: &str) -> Position {
	Position {
		status: first_field(body, &["status", "state"]).and_then(|s| SessionStatus::from_remote(&s)),
		line: first_field(body, &["line", "lineNumber"]).and_then(|l| l.parse().ok()),
		procedure: first_field(body, &["procName", "procedure"]).filter(|p| !p.is_empty()),
	}
}

fn parse_variables(body: &str) -> Vec<Variable> {
	ELEMENT_BLOCK
		.captures_iter(body)
		.filter(|caps| &caps[1] == "variable")
		.filter_map(|caps| {
			let attrs = caps.get(2).map_or("", |m| m.as_str());
			let inner = caps.get(3).map_or("", |m| m.as_str());
			let source = format!("{attrs}>{inner}");
			Some(Variable {
				name: field(&source, "name")?,
				type_name: first_field(&source, &["type", "typeName"]),
				value: field(&source, "value").unwrap_or_default(),
			})
		})
		.collect()
}

fn parse_breakpoints(body: &str) -> Vec<Breakpoint> {
	ELEMENT_BLOCK
		.captures_iter(body)
		.filter(|caps| &caps[1] == "breakpoint")
		.filter_map(|caps| {
			let attrs = caps.get(2).map_or("", |m| m.as_str());
			let inner = caps.get(3).map_or("", |m| m.as_str());
			let source = format!("{attrs}>{inner}");
			Some(Breakpoint {
				procedure: first_field(&source, &["procName", "procedure"])?,
				line: field(&source, "line")?.parse().ok()?,
				id: field(&source, "id"),
			})
		})
		.collect()
}
