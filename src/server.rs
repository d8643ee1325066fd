//! Trivia HTTP 服务
//!
//! 基于 hyper 的轻量 HTTP 层：按 (method, path) 匹配路由，
//! 把请求解码后委托给 [`TriviaService`]，统一组装响应信封。
//!
//! ## 响应信封约定
//! - 成功：`{"success": true, ...payload}`
//! - 失败：`{"success": false, "error": <code>, "message": <短语>}`
//!
//! 内部故障细节只进日志，客户端永远只见统一信封。
//! 服务状态通过 `Arc<TriviaService>` 注入，无任何进程级可变全局量。

use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::TriviaConfig;
use crate::store::CreateQuestionParams;
use crate::trivia_service::{ApiError, TriviaService};

// ============================================================================
// 请求载荷
// ============================================================================

/// POST /questions/search 载荷
#[derive(Debug, Deserialize)]
struct SearchPayload {
    search_term: String,
}

/// POST /quiz 的分类参数（显式可空对象，不依赖假值判断）
#[derive(Debug, Deserialize)]
struct QuizCategory {
    id: i64,
}

/// POST /quiz 载荷
#[derive(Debug, Deserialize)]
struct QuizPayload {
    #[serde(default)]
    previous_questions: Vec<i64>,
    #[serde(default)]
    quiz_category: Option<QuizCategory>,
}

// ============================================================================
// 服务入口
// ============================================================================

/// 启动 HTTP 服务并阻塞运行，直到收到关停信号
pub async fn serve(config: &TriviaConfig, service: Arc<TriviaService>) -> anyhow::Result<()> {
    let mut addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address '{}': {}", config.bind_addr, e))?;

    // Security: only allow loopback addresses unless explicitly opted in
    if !config.allow_external && !addr.ip().is_loopback() {
        warn!(
            "[Server] Refusing to bind to non-loopback address {}. Using localhost instead.",
            addr
        );
        addr = SocketAddr::new(
            std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            addr.port(),
        );
    }

    let make_svc = make_service_fn(move |_conn| {
        let service = service.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| handle_request(req, service.clone())))
        }
    });

    info!("[Server] Trivia API listening on http://{}", addr);

    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("[Server] Shutdown signal received");
    }
}

// ============================================================================
// 路由与请求处理
// ============================================================================

/// 处理单个请求（集成测试可直接驱动，无需绑定端口）
pub async fn handle_request(
    req: Request<Body>,
    service: Arc<TriviaService>,
) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let page = parse_page(req.uri().query());

    // CORS 预检一律放行，由具体路由决定实际动词
    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    let context = format!("{} {}", method, path);
    match dispatch(req, page, &service).await {
        Ok(payload) => Ok(success_response(payload)),
        Err(err) => {
            service.log_failure(&context, &err);
            Ok(failure_response(&err))
        }
    }
}

async fn dispatch(
    req: Request<Body>,
    page: u32,
    service: &TriviaService,
) -> Result<Value, ApiError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["categories"]) => {
            let categories = service.list_categories()?;
            Ok(json!({ "categories": categories }))
        }
        (_, ["categories"]) => Err(ApiError::MethodNotAllowed),

        (&Method::GET, ["categories", id, "questions"]) => {
            let category_id = parse_id(id)?;
            let result = service.questions_by_category(category_id, page)?;
            Ok(json!({
                "questions": result.questions,
                "total_questions": result.total,
                "current_category": result.category_id,
            }))
        }
        (_, ["categories", _, "questions"]) => Err(ApiError::MethodNotAllowed),

        (&Method::GET, ["questions"]) => {
            let result = service.list_questions(page)?;
            Ok(json!({
                "questions": result.questions,
                "total_questions": result.total,
            }))
        }
        (&Method::POST, ["questions"]) => {
            let params: CreateQuestionParams = decode_body(req).await?;
            let created = service.create_question(params)?;
            Ok(json!({
                "created": created.id,
                "questions": created.questions,
                "total_questions": created.total,
            }))
        }
        (_, ["questions"]) => Err(ApiError::MethodNotAllowed),

        (&Method::POST, ["questions", "search"]) => {
            let payload: SearchPayload = decode_body(req).await?;
            let outcome = service.search_questions(&payload.search_term)?;
            Ok(json!({
                "questions": outcome.questions,
                "total_questions": outcome.total,
                "categories": outcome.categories,
            }))
        }
        (_, ["questions", "search"]) => Err(ApiError::MethodNotAllowed),

        (&Method::DELETE, ["questions", id]) => {
            let question_id = parse_id(id)?;
            let deleted = service.delete_question(question_id)?;
            Ok(json!({ "deleted": deleted }))
        }
        (_, ["questions", _]) => Err(ApiError::MethodNotAllowed),

        (&Method::POST, ["quiz"]) => {
            let payload: QuizPayload = decode_body(req).await?;
            let category = payload.quiz_category.map(|c| c.id);
            let question = service.play_quiz(category, &payload.previous_questions)?;
            Ok(json!({ "question": question }))
        }
        (_, ["quiz"]) => Err(ApiError::MethodNotAllowed),

        _ => Err(ApiError::NotFound),
    }
}

// ============================================================================
// 解码辅助
// ============================================================================

/// 读取并解析 JSON 请求体；格式错误或缺字段一律 400
async fn decode_body<T: serde::de::DeserializeOwned>(req: Request<Body>) -> Result<T, ApiError> {
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid payload: {}", e)))
}

/// 路径参数解析；非数字 id 按路由不存在处理
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}

/// 查询串中的 page 参数，缺失或非法时取第 1 页
fn parse_page(query: Option<&str>) -> u32 {
    query
        .unwrap_or("")
        .split('&')
        .find_map(|pair| pair.strip_prefix("page="))
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(1)
}

// ============================================================================
// 响应组装
// ============================================================================

fn apply_common_headers(response: &mut Response<Body>) {
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
}

fn preflight_response() -> Response<Body> {
    let mut response = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty()));
    apply_common_headers(&mut response);
    response
}

fn success_response(payload: Value) -> Response<Body> {
    let mut body = json!({ "success": true });
    if let (Some(envelope), Some(fields)) = (body.as_object_mut(), payload.as_object()) {
        for (key, value) in fields {
            envelope.insert(key.clone(), value.clone());
        }
    }

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::from("{\"success\":true}")));
    apply_common_headers(&mut response);
    response
}

fn failure_response(err: &ApiError) -> Response<Body> {
    let code = err.status_code();
    let body = json!({
        "success": false,
        "error": code,
        "message": err.envelope_message(),
    });

    debug!("[Server] Request rejected: {} -> {}", err, code);

    let mut response = Response::builder()
        .status(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::from("{\"success\":false}")));
    apply_common_headers(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("page=3")), 3);
        assert_eq!(parse_page(Some("foo=bar&page=2")), 2);
        assert_eq!(parse_page(Some("page=abc")), 1);
        assert_eq!(parse_page(Some("")), 1);
    }

    #[test]
    fn test_parse_id_rejects_non_numeric() {
        assert_eq!(parse_id("17").unwrap(), 17);
        assert!(matches!(parse_id("abc"), Err(ApiError::NotFound)));
    }

    #[test]
    fn test_failure_response_envelope() {
        let response = failure_response(&ApiError::MethodNotAllowed);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }
}
