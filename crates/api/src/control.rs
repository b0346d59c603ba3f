use crate::{
    bot::status::{InvalidMode, RestartMode, Status, VERSION},
    quiz::registry::Registry,
};
use chrono::{DateTime, NaiveDate};
use db::{ScoreLedger, UsageStats};
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Method, Request, Response, StatusCode,
};
use model::stats::MessageQuery;
use serde_json::{json, Value};
use std::sync::Arc;
use url::form_urlencoded;

enum Route {
    Status,
    Enable,
    Disable,
    Restart,
    Overview,
    Messages,
    Users,
    Commands,
    Jokes,
    Leaderboard,
}

/// Operator-facing HTTP endpoints.
pub struct Control {
    api_key: Box<str>,
    status: Arc<Status>,
    stats: Arc<UsageStats>,
    ledger: Arc<ScoreLedger>,
    registry: Arc<Registry>,
}

impl Control {
    pub fn new(
        api_key: Box<str>,
        status: Arc<Status>,
        stats: Arc<UsageStats>,
        ledger: Arc<ScoreLedger>,
        registry: Arc<Registry>,
    ) -> Self {
        if api_key.is_empty() {
            log::warn!("no API key configured: all control requests will be rejected");
        }
        Self { api_key, status, stats, ledger, registry }
    }

    pub async fn respond<B: AsRef<[u8]>>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        match self.try_respond(req).await {
            Ok(res) => res,
            Err(code) => {
                let error = match code {
                    StatusCode::UNAUTHORIZED => "unauthorized",
                    StatusCode::NOT_FOUND => "not found",
                    StatusCode::BAD_REQUEST => "bad request",
                    _ => code.canonical_reason().unwrap_or("internal error"),
                };
                json_response(code, json!({ "error": error }).to_string().into_bytes())
            }
        }
    }

    pub async fn try_respond<B: AsRef<[u8]>>(&self, req: &Request<B>) -> Result<Response<Full<Bytes>>, StatusCode> {
        let route = match (req.method(), req.uri().path()) {
            (&Method::GET, "/health") => {
                let body = json!({ "ok": true, "version": VERSION });
                return Ok(json_response(StatusCode::OK, body.to_string().into_bytes()));
            }
            (&Method::GET, "/bot/status") => Route::Status,
            (&Method::POST, "/bot/enable") => Route::Enable,
            (&Method::POST, "/bot/disable") => Route::Disable,
            (&Method::POST, "/bot/restart") => Route::Restart,
            (&Method::GET, "/stats") => Route::Overview,
            (&Method::GET, "/stats/messages") => Route::Messages,
            (&Method::GET, "/stats/users") => Route::Users,
            (&Method::GET, "/stats/commands") => Route::Commands,
            (&Method::GET, "/stats/jokes") => Route::Jokes,
            (&Method::GET, "/quiz/leaderboard") => Route::Leaderboard,
            _ => return Err(StatusCode::NOT_FOUND),
        };

        self.authorize(req.headers())?;
        let query = req.uri().query().unwrap_or_default();
        let top = parse_top(query);

        let bytes = match route {
            Route::Status => serde_json::to_vec(&json!({
                "enabled": self.status.is_enabled(),
                "uptimeMs": self.status.uptime().as_millis() as u64,
                "version": VERSION,
                "restartMode": self.status.restart_mode().as_str(),
                "activeQuizzes": self.registry.active(),
            })),
            Route::Enable | Route::Disable => {
                let enabled = matches!(route, Route::Enable);
                if self.status.set_enabled(enabled) != enabled {
                    log::info!("chat commands {}", if enabled { "enabled" } else { "disabled" });
                }
                serde_json::to_vec(&json!({ "enabled": enabled }))
            }
            Route::Restart => return Ok(self.restart(req.body().as_ref())),
            Route::Overview => serde_json::to_vec(&self.stats.overview().await),
            Route::Messages => serde_json::to_vec(&self.stats.messages(&parse_messages(query)?).await),
            Route::Users => serde_json::to_vec(&self.stats.users(top.unwrap_or(10)).await),
            Route::Commands => serde_json::to_vec(&self.stats.commands(top.unwrap_or(20)).await),
            Route::Jokes => serde_json::to_vec(&self.stats.jokes(top.unwrap_or(10)).await),
            Route::Leaderboard => {
                let n = top.unwrap_or(10).clamp(3, 25);
                serde_json::to_vec(&self.ledger.top(n).await)
            }
        }
        .map_err(|err| {
            log::error!("cannot encode control response: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

        Ok(json_response(StatusCode::OK, bytes))
    }

    /// Accepts `{ "mode": "soft" | "hard" }`. A missing or empty mode falls back to the configured one.
    fn restart(&self, body: &[u8]) -> Response<Full<Bytes>> {
        let requested = serde_json::from_slice::<Value>(body).ok().and_then(|mut body| body.get_mut("mode").map(Value::take));
        let mode = match requested {
            None | Some(Value::Null) => Ok(self.status.restart_mode()),
            Some(Value::String(mode)) if mode.is_empty() => Ok(self.status.restart_mode()),
            Some(Value::String(mode)) => mode.parse::<RestartMode>(),
            Some(_) => Err(InvalidMode),
        };

        let (code, body) = match mode {
            Ok(mode) => {
                self.status.request_restart(mode);
                (StatusCode::ACCEPTED, json!({ "ok": true, "mode": mode.as_str() }))
            }
            Err(err) => (StatusCode::BAD_REQUEST, json!({ "ok": false, "error": err.to_string() })),
        };
        json_response(code, body.to_string().into_bytes())
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        if self.api_key.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let key = headers.get("X-API-Key").ok_or(StatusCode::UNAUTHORIZED)?;
        if key.as_bytes() != self.api_key.as_bytes() {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(())
    }
}

fn json_response(code: StatusCode, bytes: Vec<u8>) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(Bytes::from(bytes)));
    *res.status_mut() = code;
    assert!(res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json")).is_none());
    res
}

/// Extracts a numeric `top` parameter from the query string. Unparsable values fall back to the default.
fn parse_top(query: &str) -> Option<usize> {
    form_urlencoded::parse(query.as_bytes()).find(|(key, _)| key == "top").and_then(|(_, value)| value.parse().ok())
}

/// Reads the `/stats/messages` filter. Empty parameters are ignored; malformed ones are rejected.
fn parse_messages(query: &str) -> Result<MessageQuery, StatusCode> {
    let mut filter = MessageQuery::default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match &*key {
            "from" => filter.from = Some(parse_instant(&value).ok_or(StatusCode::BAD_REQUEST)?),
            "to" => filter.to = Some(parse_instant(&value).ok_or(StatusCode::BAD_REQUEST)?),
            "channelId" => filter.channel_id = Some(value.parse().map_err(|_| StatusCode::BAD_REQUEST)?),
            "userId" => filter.user_id = Some(value.parse().map_err(|_| StatusCode::BAD_REQUEST)?),
            _ => {}
        }
    }
    Ok(filter)
}

/// Milliseconds since the Unix epoch, given as such, as an RFC 3339 timestamp, or as a `YYYY-MM-DD` date at midnight UTC.
fn parse_instant(value: &str) -> Option<u64> {
    if let Ok(ms) = value.parse() {
        return Some(ms);
    }
    let ms = match DateTime::parse_from_rfc3339(value) {
        Ok(time) => time.timestamp_millis(),
        Err(_) => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis(),
    };
    u64::try_from(ms).ok()
}

#[cfg(test)]
mod tests {
    use super::{parse_instant, parse_messages, parse_top, Control};
    use crate::{
        bot::status::{RestartMode, Status},
        quiz::registry::Registry,
    };
    use core::{num::NonZeroU64, time::Duration};
    use db::{Award, Origin, ScoreLedger, UsageStats};
    use http_body_util::BodyExt;
    use hyper::{Method, Request, StatusCode};
    use model::stats::MessageQuery;
    use serde_json::Value;
    use std::sync::Arc;

    const DAY: u64 = 24 * 60 * 60 * 1000;

    struct Fixture {
        control: Control,
        status: Arc<Status>,
        stats: Arc<UsageStats>,
        ledger: Arc<ScoreLedger>,
        _dir: tempfile::TempDir,
    }

    fn fixture(api_key: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let status = Arc::new(Status::new(RestartMode::Hard));
        let stats = Arc::new(UsageStats::new(dir.path()));
        let ledger = Arc::new(ScoreLedger::new(dir.path()));
        let control = Control::new(
            api_key.into(),
            Arc::clone(&status),
            Arc::clone(&stats),
            Arc::clone(&ledger),
            Arc::new(Registry::default()),
        );
        Fixture { control, status, stats, ledger, _dir: dir }
    }

    fn request(method: Method, uri: &str, key: Option<&str>) -> Request<&'static str> {
        with_body(method, uri, key, "")
    }

    fn with_body(method: Method, uri: &str, key: Option<&str>, body: &'static str) -> Request<&'static str> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header("X-API-Key", key);
        }
        builder.body(body).unwrap()
    }

    async fn call(control: &Control, req: Request<&'static str>) -> (StatusCode, Value) {
        let res = control.respond(&req).await;
        let code = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (code, serde_json::from_slice(&bytes).unwrap())
    }

    fn origin(user: u64, channel: u64) -> Origin {
        Origin { user: NonZeroU64::new(user).unwrap(), channel: NonZeroU64::new(channel).unwrap(), guild: None }
    }

    #[test]
    fn parses_top_from_query() {
        assert_eq!(parse_top("top=5"), Some(5));
        assert_eq!(parse_top("a=1&top=12&b"), Some(12));
        assert_eq!(parse_top("top=lots"), None);
        assert_eq!(parse_top("top=-3"), None);
        assert_eq!(parse_top(""), None);
    }

    #[test]
    fn parses_instants() {
        assert_eq!(parse_instant("86400000"), Some(DAY));
        assert_eq!(parse_instant("1970-01-02"), Some(DAY));
        assert_eq!(parse_instant("1970-01-02T01:00:00+01:00"), Some(DAY));
        assert_eq!(parse_instant("1970-01-02T00:00:00.5Z"), Some(DAY + 500));
        assert_eq!(parse_instant("1969-12-31"), None);
        assert_eq!(parse_instant("yesterday"), None);
    }

    #[test]
    fn parses_message_filters() {
        let query = parse_messages("from=1970-01-02&to=&channelId=9&userId=2&extra=1").unwrap();
        assert_eq!(query, MessageQuery { from: Some(DAY), to: None, channel_id: Some(9), user_id: Some(2) });

        let encoded = parse_messages("from=1970-01-02T01%3A00%3A00%2B01%3A00").unwrap();
        assert_eq!(encoded.from, Some(DAY));

        assert_eq!(parse_messages("").unwrap(), MessageQuery::default());
        assert_eq!(parse_messages("from=soon"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(parse_messages("userId=me"), Err(StatusCode::BAD_REQUEST));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn health_needs_no_key() {
        let Fixture { control, _dir, .. } = fixture("secret");
        let (code, body) = call(&control, request(Method::GET, "/health", None)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert!(body["version"].is_string());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_missing_or_wrong_keys() {
        let Fixture { control, _dir, .. } = fixture("secret");
        for key in [None, Some("guess")] {
            let (code, body) = call(&control, request(Method::GET, "/bot/status", key)).await;
            assert_eq!(code, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], "unauthorized");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_key_rejects_everything() {
        let Fixture { control, _dir, .. } = fixture("");
        let (code, _) = call(&control, request(Method::GET, "/stats", Some(""))).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unknown_routes_are_not_found() {
        let Fixture { control, _dir, .. } = fixture("secret");
        let (code, body) = call(&control, request(Method::GET, "/nope", None)).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not found");

        let (code, _) = call(&control, request(Method::GET, "/bot/enable", Some("secret"))).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn toggles_the_bot() {
        let Fixture { control, status, _dir, .. } = fixture("secret");
        let (code, body) = call(&control, request(Method::POST, "/bot/disable", Some("secret"))).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["enabled"], false);
        assert!(!status.is_enabled());

        let (_, body) = call(&control, request(Method::GET, "/bot/status", Some("secret"))).await;
        assert_eq!(body["enabled"], false);
        assert_eq!(body["activeQuizzes"], 0);
        assert_eq!(body["restartMode"], "hard");
        assert!(body["uptimeMs"].is_u64());

        let (_, body) = call(&control, request(Method::POST, "/bot/enable", Some("secret"))).await;
        assert_eq!(body["enabled"], true);
        assert!(status.is_enabled());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn restarts_in_the_requested_mode() {
        let Fixture { control, status, _dir, .. } = fixture("secret");
        let (code, body) =
            call(&control, with_body(Method::POST, "/bot/restart", Some("secret"), r#"{"mode":"SOFT"}"#)).await;
        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(body["ok"], true);
        assert_eq!(body["mode"], "soft");
        tokio::time::timeout(Duration::from_secs(1), status.reconnect_requested()).await.unwrap();

        // Without a mode the configured one applies.
        let (code, body) = call(&control, request(Method::POST, "/bot/restart", Some("secret"))).await;
        assert_eq!(code, StatusCode::ACCEPTED);
        assert_eq!(body["mode"], "hard");
        tokio::time::timeout(Duration::from_secs(1), status.shutdown_requested()).await.unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(1), status.reconnect_requested()).await.is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_unknown_restart_modes() {
        let Fixture { control, _dir, .. } = fixture("secret");
        for body in [r#"{"mode":"reboot"}"#, r#"{"mode":3}"#] {
            let (code, body) = call(&control, with_body(Method::POST, "/bot/restart", Some("secret"), body)).await;
            assert_eq!(code, StatusCode::BAD_REQUEST);
            assert_eq!(body["ok"], false);
            assert_eq!(body["error"], "invalid mode");
        }

        let (code, _) = call(&control, with_body(Method::POST, "/bot/restart", None, r#"{"mode":"hard"}"#)).await;
        assert_eq!(code, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reports_statistics() {
        let Fixture { control, stats, _dir, .. } = fixture("secret");
        for user in [1, 2, 2] {
            stats.record_message(origin(user, 9), 1_000).await;
        }
        stats.record_command("quiz", NonZeroU64::new(2).unwrap(), 1_000).await;
        stats.record_joke("7", NonZeroU64::new(1).unwrap(), 1_000).await;

        let (_, body) = call(&control, request(Method::GET, "/stats", Some("secret"))).await;
        assert_eq!(body["totals"]["messages"], 3);
        assert_eq!(body["totals"]["uniqueUsers"], 2);
        assert_eq!(body["top"]["usersByMessages"][0]["userId"], 2);
        assert_eq!(body["top"]["commands"][0]["name"], "quiz");
        assert_eq!(body["top"]["jokes"][0]["id"], "7");

        let (_, body) = call(&control, request(Method::GET, "/stats/users?top=1", Some("secret"))).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["top"][0]["userId"], 2);
        assert_eq!(body["top"].as_array().unwrap().len(), 1);

        let (_, body) = call(&control, request(Method::GET, "/stats/commands", Some("secret"))).await;
        assert_eq!(body[0]["name"], "quiz");
        assert_eq!(body[0]["count"], 1);

        let (_, body) = call(&control, request(Method::GET, "/stats/jokes?top=5", Some("secret"))).await;
        assert_eq!(body[0]["id"], "7");
        assert_eq!(body[0]["count"], 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn filters_messages() {
        let Fixture { control, stats, _dir, .. } = fixture("secret");
        stats.record_message(origin(1, 9), 1_000).await;
        stats.record_message(origin(2, 9), DAY + 1).await;
        stats.record_message(origin(2, 8), DAY + 2).await;
        stats.record_message(origin(1, 9), 3 * DAY).await;

        let (code, body) = call(&control, request(Method::GET, "/stats/messages", Some("secret"))).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["count"], 4);
        assert_eq!(body["byDay"].as_array().unwrap().len(), 3);

        let uri = "/stats/messages?from=1970-01-02&to=1970-01-03&channelId=9";
        let (_, body) = call(&control, request(Method::GET, uri, Some("secret"))).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["byUser"][0]["userId"], 2);
        assert_eq!(body["byDay"][0]["day"], "1970-01-02");

        let (code, body) = call(&control, request(Method::GET, "/stats/messages?to=later", Some("secret"))).await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad request");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn leaderboard_is_clamped() {
        let Fixture { control, ledger, _dir, .. } = fixture("secret");
        let awards: Vec<_> = (1..=5)
            .map(|user| Award { user: NonZeroU64::new(user).unwrap(), name: None, points: user })
            .collect();
        ledger.award(&awards).await.unwrap();

        let (_, body) = call(&control, request(Method::GET, "/quiz/leaderboard?top=1", Some("secret"))).await;
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["userId"], 5);
        assert_eq!(rows[0]["points"], 5);
    }
}
