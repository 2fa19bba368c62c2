//! HTTP server for interactive mode
//!
//! `herdscope serve [tracking.csv]` → starts server, opens browser, shows the
//! dashboard. Requests are handled one at a time on the calling thread; the
//! server loop owns the session.

use crate::dashboard::{self, DashboardView};
use crate::dataset::{Dataset, FrameRate};
use crate::error::{Error, SchemaError};
use crate::filter::{FilterOptions, FilterParams};
use crate::ingest;
use crate::pipeline::Pipeline;
use crate::report::html::{CHARTS_JS, STYLE};
use crate::report::xlsx::{self, EXPORT_FILE_NAME, MIME_TYPE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{info, warn};

// Embed the UI directly in the binary
const UI_HTML: &str = include_str!("ui.html");

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, data: None, error: Some(error.into()) }
    }
}

/// View parameters as they arrive in a query string or JSON body.
///
/// List values are matched exactly against the dataset's filter options.
/// An absent list means "everything"; a present but empty one means
/// "nothing". In a JSON body lists are arrays. In a query string `ids` and
/// `actions` repeat once per value, and a single blank value (`ids=`) stands
/// for the empty list.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct ViewParams {
    pub fps: Option<u32>,
    pub ids: Option<Vec<i64>>,
    pub actions: Option<Vec<String>>,
    pub frame_min: Option<i64>,
    pub frame_max: Option<i64>,
}

impl ViewParams {
    pub fn filter(&self) -> FilterParams {
        FilterParams {
            ids: self.ids.clone(),
            actions: self.actions.clone(),
            frame_min: self.frame_min,
            frame_max: self.frame_max,
        }
    }

    /// Build from decoded `key=value` pairs. Unknown keys are ignored.
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, String> {
        let mut params = ViewParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "fps" => params.fps = Some(parse_value(&key, &value)?),
                "frame_min" => params.frame_min = Some(parse_value(&key, &value)?),
                "frame_max" => params.frame_max = Some(parse_value(&key, &value)?),
                "ids" => {
                    let ids = params.ids.get_or_insert_with(Vec::new);
                    if !value.is_empty() {
                        ids.push(parse_value(&key, &value)?);
                    }
                }
                "actions" => {
                    let actions = params.actions.get_or_insert_with(Vec::new);
                    if !value.is_empty() {
                        actions.push(value);
                    }
                }
                _ => {}
            }
        }
        Ok(params)
    }

    fn validate(self) -> Result<Self, String> {
        if let Some(fps) = self.fps {
            FrameRate::new(fps as i64).map_err(|e| e.to_string())?;
        }
        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value for '{}': '{}'", key, value))
}

#[derive(Deserialize, Debug, Default)]
struct UploadParams {
    filename: Option<String>,
}

/// Acknowledgment returned for a successful upload.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UploadAck {
    pub message: String,
    pub source: String,
    pub detections: usize,
    pub skipped_rows: usize,
    pub options: FilterOptions,
}

impl UploadAck {
    fn for_dataset(ds: &Dataset) -> Self {
        Self {
            message: format!("File loaded: {}", ds.source),
            source: ds.source.clone(),
            detections: ds.len(),
            skipped_rows: ds.skipped_rows,
            options: FilterOptions::from_dataset(ds),
        }
    }
}

/// Where the single user's session stands.
#[derive(Debug, Default)]
pub enum SessionState {
    #[default]
    NoFileLoaded,
    Loaded(Dataset),
    /// Last upload lacked required columns.
    SchemaInvalid { file: String, error: SchemaError },
    /// Last upload could not be parsed or converted.
    Unreadable { file: String, message: String },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NoFileLoaded => "no_file_loaded",
            SessionState::Loaded(_) => "loaded",
            SessionState::SchemaInvalid { .. } => "schema_invalid",
            SessionState::Unreadable { .. } => "unreadable",
        }
    }
}

/// A response before it is handed to the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub attachment: Option<&'static str>,
}

impl Reply {
    fn html(body: String) -> Self {
        Self { status: 200, content_type: "text/html; charset=utf-8", body: body.into_bytes(), attachment: None }
    }

    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|e| {
            serde_json::json!({ "ok": false, "data": null, "error": e.to_string() })
                .to_string()
                .into_bytes()
        });
        Self { status, content_type: "application/json", body, attachment: None }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &ApiResponse::failure(message))
    }

    fn not_found() -> Self {
        Self { status: 404, content_type: "text/plain", body: b"Not found".to_vec(), attachment: None }
    }
}

/// The dashboard application: session state plus request routing.
#[derive(Debug, Default)]
pub struct App {
    pipeline: Pipeline,
    state: SessionState,
}

impl App {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline, state: SessionState::NoFileLoaded }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Load a file into the session. Any failure replaces the current
    /// dataset, so views stay halted until a good file arrives.
    pub fn upload(&mut self, bytes: &[u8], file_name: &str) -> Result<UploadAck, String> {
        match self.pipeline.load_bytes(bytes, file_name) {
            Ok(dataset) => {
                let ack = UploadAck::for_dataset(&dataset);
                self.state = SessionState::Loaded(dataset);
                Ok(ack)
            }
            Err(Error::Schema(error)) => {
                warn!(file = file_name, missing = ?error.missing, "rejected upload");
                let message = format!("{}. Check that it comes from the tracker.", error);
                self.state = SessionState::SchemaInvalid { file: file_name.to_string(), error };
                Err(message)
            }
            Err(e) => {
                warn!(file = file_name, error = %e, "unreadable upload");
                let message = e.to_string();
                self.state = SessionState::Unreadable { file: file_name.to_string(), message: message.clone() };
                Err(message)
            }
        }
    }

    /// Re-run the dashboard for `params`.
    pub fn view(&mut self, params: &ViewParams) -> Result<DashboardView, String> {
        let dataset = self.dataset_mut()?;
        if let Some(fps) = params.fps {
            let fps = FrameRate::new(fps as i64).map_err(|e| e.to_string())?;
            dataset.set_frame_rate(fps);
        }
        Ok(dashboard::render_with(dataset, &params.filter()))
    }

    /// The filtered table as xlsx bytes.
    pub fn export(&mut self, params: &ViewParams) -> Result<Vec<u8>, String> {
        let view = self.view(params)?;
        xlsx::to_bytes(&view).map_err(|e| e.to_string())
    }

    fn dataset_mut(&mut self) -> Result<&mut Dataset, String> {
        match &mut self.state {
            SessionState::Loaded(ds) => Ok(ds),
            SessionState::NoFileLoaded => {
                Err("Upload a CSV or Excel tracking file to begin.".to_string())
            }
            SessionState::SchemaInvalid { file, error } => Err(format!(
                "{}: {}. Upload a corrected file to continue.",
                file, error
            )),
            SessionState::Unreadable { file, message } => Err(format!(
                "{}: {}. Upload a corrected file to continue.",
                file, message
            )),
        }
    }

    /// Route one request.
    pub fn handle(&mut self, method: &Method, url: &str, body: &[u8]) -> Reply {
        let path = url.split('?').next().unwrap_or("/");
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");

        match (method, path) {
            (&Method::Get, "/") => Reply::html(ui_html()),

            (&Method::Post, "/api/upload") => {
                let params: UploadParams = serde_urlencoded::from_str(query).unwrap_or_default();
                let Some(name) = params.filename.filter(|n| !n.trim().is_empty()) else {
                    return Reply::error(400, "missing ?filename=");
                };
                if !ingest::is_supported(&name) {
                    return Reply::error(415, format!("unsupported file type: {}", name));
                }
                match self.upload(body, &name) {
                    Ok(ack) => Reply::json(200, &ApiResponse::success(ack)),
                    Err(message) => Reply::error(422, message),
                }
            }

            (&Method::Get, "/api/view") | (&Method::Post, "/api/view") => {
                let params = match parse_params(query, body) {
                    Ok(params) => params,
                    Err(message) => return Reply::error(400, message),
                };
                match self.view(&params) {
                    Ok(view) => Reply::json(200, &ApiResponse::success(view)),
                    Err(message) => Reply::error(409, message),
                }
            }

            (&Method::Get, "/api/export") | (&Method::Post, "/api/export") => {
                let params = match parse_params(query, body) {
                    Ok(params) => params,
                    Err(message) => return Reply::error(400, message),
                };
                match self.export(&params) {
                    Ok(bytes) => Reply {
                        status: 200,
                        content_type: MIME_TYPE,
                        body: bytes,
                        attachment: Some(EXPORT_FILE_NAME),
                    },
                    Err(message) => Reply::error(409, message),
                }
            }

            (&Method::Get, "/api/state") => {
                Reply::json(200, &ApiResponse::success(self.state.name()))
            }

            _ => Reply::not_found(),
        }
    }
}

/// Query string first, then a JSON body, then defaults.
///
/// A parameter that does not parse rejects the whole request rather than
/// being dropped.
pub fn parse_params(query: &str, body: &[u8]) -> Result<ViewParams, String> {
    let params = if !query.is_empty() {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query).map_err(|e| format!("invalid query string: {}", e))?;
        ViewParams::from_pairs(pairs)?
    } else if !body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(body).map_err(|e| format!("invalid request body: {}", e))?
    } else {
        ViewParams::default()
    };
    params.validate()
}

fn ui_html() -> String {
    UI_HTML
        .replace("{{STYLE}}", STYLE)
        .replace("{{CHARTS_JS}}", CHARTS_JS)
        .replace("{{DEFAULT_FPS}}", &FrameRate::DEFAULT_FPS.to_string())
}

/// Start server, open browser, serve UI
pub fn start(port: u16, path: Option<PathBuf>, pipeline: Pipeline) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let mut app = App::new(pipeline);
    if let Some(path) = path {
        let bytes = std::fs::read(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match app.upload(&bytes, &name) {
            Ok(ack) => eprintln!("   \x1b[32m{}\x1b[0m", ack.message),
            Err(message) => eprintln!("   \x1b[31m{}\x1b[0m", message),
        }
    }

    let url = format!("http://localhost:{}", port);
    eprintln!("\n\x1b[1;32m🐄 Herdscope\x1b[0m");
    eprintln!("   {}", url);
    info!(%addr, state = app.state().name(), "listening");

    // Open browser
    let _ = open::that(&url);

    // Handle requests
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(&mut app, request) {
            warn!(error = %e, "request failed");
        }
    }

    Ok(())
}

fn handle_request(app: &mut App, mut request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();

    let mut body = Vec::new();
    request.as_reader().read_to_end(&mut body)?;

    let reply = app.handle(&method, &url, &body);
    info!(%method, %url, status = reply.status, bytes = reply.body.len(), "request");

    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response = response.with_header(header);
    }
    if let Some(name) = reply.attachment {
        let value = format!("attachment; filename=\"{}\"", name);
        if let Ok(header) = Header::from_bytes(&b"Content-Disposition"[..], value.as_bytes()) {
            response = response.with_header(header);
        }
    }
    request.respond(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACKING: &[u8] = b"frame,id,x1,y1,x2,y2,accion\n\
                              0,1,10,10,50,50,pie\n\
                              25,1,12,10,52,50,Pie\n\
                              50,2,200,80,260,140,comiendo\n";

    fn json(reply: &Reply) -> serde_json::Value {
        serde_json::from_slice(&reply.body).unwrap()
    }

    fn loaded_app() -> App {
        let mut app = App::default();
        let reply = app.handle(&Method::Post, "/api/upload?filename=tracking_vacas.csv", TRACKING);
        assert_eq!(reply.status, 200);
        app
    }

    // ==========================================================================
    // STATE MACHINE
    // ==========================================================================

    #[test]
    fn test_views_halted_before_upload() {
        let mut app = App::default();
        assert_eq!(app.state().name(), "no_file_loaded");

        let reply = app.handle(&Method::Get, "/api/view", b"");
        assert_eq!(reply.status, 409);
        assert_eq!(json(&reply)["ok"], false);
    }

    #[test]
    fn test_upload_acknowledges_file() {
        let mut app = App::default();
        let reply = app.handle(&Method::Post, "/api/upload?filename=tracking_vacas.csv", TRACKING);
        let body = json(&reply);

        assert_eq!(body["data"]["message"], "File loaded: tracking_vacas.csv");
        assert_eq!(body["data"]["options"]["actions"], serde_json::json!(["Comiendo", "Pie"]));
        assert_eq!(app.state().name(), "loaded");
    }

    #[test]
    fn test_schema_error_halts_until_valid_upload() {
        let mut app = loaded_app();

        let reply = app.handle(&Method::Post, "/api/upload?filename=bad.csv", b"frame,id\n0,1\n");
        assert_eq!(reply.status, 422);
        let error = json(&reply)["error"].as_str().unwrap().to_string();
        assert!(error.contains("x1, y1, x2, y2, accion"), "got {}", error);
        assert_eq!(app.state().name(), "schema_invalid");

        // The previous dataset is gone; no partial rendering
        assert_eq!(app.handle(&Method::Get, "/api/view", b"").status, 409);
        assert_eq!(app.handle(&Method::Get, "/api/export", b"").status, 409);

        app.handle(&Method::Post, "/api/upload?filename=ok.csv", TRACKING);
        assert_eq!(app.handle(&Method::Get, "/api/view", b"").status, 200);
    }

    #[test]
    fn test_conversion_error_is_reported() {
        let mut app = App::default();
        let csv = b"frame,id,x1,y1,x2,y2,accion\n0,vaca,1,1,2,2,pie\n";
        let reply = app.handle(&Method::Post, "/api/upload?filename=t.csv", csv);
        assert_eq!(reply.status, 422);
        assert!(json(&reply)["error"].as_str().unwrap().contains("column 'id'"));
        assert_eq!(app.state().name(), "unreadable");
    }

    #[test]
    fn test_upload_requires_supported_name() {
        let mut app = App::default();
        assert_eq!(app.handle(&Method::Post, "/api/upload", TRACKING).status, 400);
        assert_eq!(app.handle(&Method::Post, "/api/upload?filename=t.pdf", TRACKING).status, 415);
    }

    // ==========================================================================
    // VIEWS AND EXPORT
    // ==========================================================================

    #[test]
    fn test_view_with_query_filters() {
        let mut app = loaded_app();
        let reply = app.handle(&Method::Get, "/api/view?ids=1&actions=Pie", b"");
        let body = json(&reply);

        assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 2);
        let row = &body["data"]["summary"]["rows"][0];
        assert_eq!(row["frame_count"], 2);
        assert_eq!(row["duration_seconds"], 1.0);
        assert_eq!(row["percentage"], 100.0);
    }

    #[test]
    fn test_view_with_json_body() {
        let mut app = loaded_app();
        let reply = app.handle(&Method::Post, "/api/view", br#"{"frame_min": 25, "frame_max": 50}"#);
        assert_eq!(json(&reply)["data"]["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_blank_list_selects_nothing() {
        let mut app = loaded_app();
        let body = json(&app.handle(&Method::Get, "/api/view?ids=", b""));
        assert_eq!(body["ok"], true);
        assert!(body["data"]["rows"].as_array().unwrap().is_empty());
        assert!(body["data"]["summary"]["rows"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_fps_change_rederives_elapsed() {
        let mut app = loaded_app();
        let body = json(&app.handle(&Method::Get, "/api/view?fps=50", b""));
        assert_eq!(body["data"]["frame_rate"], 50);
        assert_eq!(body["data"]["rows"][2][7], 1.0);

        let reply = app.handle(&Method::Get, "/api/view?fps=0", b"");
        assert_eq!(reply.status, 400);
    }

    #[test]
    fn test_export_download() {
        let mut app = loaded_app();
        let reply = app.handle(&Method::Get, "/api/export?ids=2", b"");

        assert_eq!(reply.status, 200);
        assert_eq!(reply.content_type, MIME_TYPE);
        assert_eq!(reply.attachment, Some("analisis_vacas_filtrado.xlsx"));

        let table = ingest::load(&reply.body, EXPORT_FILE_NAME).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_index_and_not_found() {
        let mut app = App::default();
        let index = app.handle(&Method::Get, "/", b"");
        let html = String::from_utf8(index.body).unwrap();
        assert!(html.contains("function renderView("));
        assert!(!html.contains("{{STYLE}}"));
        // Selections go back as JSON arrays of the offered values
        assert!(html.contains("post('/api/view', params())"));
        assert!(html.contains("post('/api/export', params())"));
        assert_eq!(app.handle(&Method::Get, "/nope", b"").status, 404);
    }

    #[test]
    fn test_parse_params_precedence() {
        let p = parse_params("fps=30&ids=1&ids=2", br#"{"fps": 10}"#).unwrap();
        assert_eq!(p.fps, Some(30));
        assert_eq!(p.filter().ids, Some(vec![1, 2]));

        let p = parse_params("", br#"{"actions": ["Pie", "Echada"]}"#).unwrap();
        assert_eq!(p.filter().actions, Some(vec!["Pie".to_string(), "Echada".to_string()]));

        assert_eq!(parse_params("", b""), Ok(ViewParams::default()));
    }

    #[test]
    fn test_query_values_are_kept_verbatim() {
        let p = parse_params("actions=%20echada&actions=Comiendo%2C+rapido&ids=", b"").unwrap();
        assert_eq!(p.actions, Some(vec![" echada".to_string(), "Comiendo, rapido".to_string()]));
        assert_eq!(p.ids, Some(vec![]));
    }

    // ==========================================================================
    // LABELS WITH COMMAS AND SPACES
    // ==========================================================================

    const ODD_LABELS: &[u8] = b"frame,id,x1,y1,x2,y2,accion\n\
                                0,1,1,1,2,2,\"comiendo, rapido\"\n\
                                25,1,1,1,2,2,pie\n\
                                50,2,1,1,2,2,\" echada\"\n";

    #[test]
    fn test_default_selection_keeps_every_label() {
        let mut app = App::default();
        let upload = json(&app.handle(&Method::Post, "/api/upload?filename=odd.csv", ODD_LABELS));
        let options = &upload["data"]["options"];
        assert_eq!(options["actions"], serde_json::json!([" echada", "Comiendo, rapido", "Pie"]));

        // Send back exactly what the options offered, as the page does
        let body = serde_json::json!({
            "fps": 25,
            "ids": options["subject_ids"],
            "actions": options["actions"],
        });
        let reply = app.handle(&Method::Post, "/api/view", body.to_string().as_bytes());
        assert_eq!(reply.status, 200);
        assert_eq!(json(&reply)["data"]["rows"].as_array().unwrap().len(), 3);

        let reply = app.handle(&Method::Get, "/api/view?actions=%20echada&actions=Comiendo%2C%20rapido", b"");
        assert_eq!(json(&reply)["data"]["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_export_accepts_json_selection() {
        let mut app = App::default();
        app.handle(&Method::Post, "/api/upload?filename=odd.csv", ODD_LABELS);
        let reply = app.handle(&Method::Post, "/api/export", br#"{"actions": [" echada"]}"#);

        assert_eq!(reply.status, 200);
        assert_eq!(ingest::load(&reply.body, EXPORT_FILE_NAME).unwrap().len(), 1);
    }

    // ==========================================================================
    // BAD PARAMETERS
    // ==========================================================================

    #[test]
    fn test_bad_parameters_are_rejected() {
        let mut app = loaded_app();
        for url in [
            "/api/view?ids=1&fps=",
            "/api/view?fps=-1",
            "/api/view?frame_min=abc",
            "/api/view?ids=vaca",
            "/api/export?ids=1&fps=",
        ] {
            let reply = app.handle(&Method::Get, url, b"");
            assert_eq!(reply.status, 400, "{}", url);
            assert_eq!(json(&reply)["ok"], false, "{}", url);
        }

        let reply = app.handle(&Method::Post, "/api/view", br#"{"ids": "1"}"#);
        assert_eq!(reply.status, 400);
        assert!(json(&reply)["error"].as_str().unwrap().contains("invalid request body"));

        // Still loaded, and valid filters still apply
        let body = json(&app.handle(&Method::Get, "/api/view?ids=1", b""));
        assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 2);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("bad \"value\" \\ here"))
        }
    }

    #[test]
    fn test_serialization_failure_is_still_json() {
        let reply = Reply::json(500, &Unserializable);
        let body = json(&reply);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("bad \"value\" \\ here"));
    }
}
