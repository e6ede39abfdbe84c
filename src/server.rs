//! HTTPサーバ
//!
//! パイプラインのコマンドをactix-webのルートとして公開します。

use actix_multipart::Multipart;
use actix_web::{
    http::StatusCode, middleware::Logger, web, App, HttpMessage, HttpRequest, HttpResponse,
    HttpServer, ResponseError,
};
use futures_util::{Stream, StreamExt};
use serde_json::json;

use crate::model::ServerSettings;
use crate::pipeline::PredictError;
use crate::predict_commands;
use crate::types::{HealthOut, ImageInput, PredictionCreate};
use crate::AppState;

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::Decode(_) | PredictError::Preprocess(_) => StatusCode::BAD_REQUEST,
            PredictError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PredictError::Inference(_) | PredictError::Config(_) | PredictError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

/// 同期処理をブロッキング用スレッドで実行
async fn run_blocking<T, F>(task: F) -> Result<T, PredictError>
where
    F: FnOnce() -> Result<T, PredictError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| PredictError::Inference(format!("推論スレッドエラー: {}", e)))?;

    if let Err(ref e) = result {
        if e.is_client_error() {
            log::warn!("リクエストを拒否しました: {}", e);
        } else {
            log::error!("処理に失敗しました: {}", e);
        }
    }
    result
}

const DEFAULT_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// アップロードの最大サイズ（バイト）
#[derive(Debug, Clone, Copy)]
pub struct UploadLimit(pub usize);

fn upload_limit(req: &HttpRequest) -> usize {
    req.app_data::<web::Data<UploadLimit>>()
        .map(|limit| limit.0)
        .unwrap_or(DEFAULT_UPLOAD_LIMIT)
}

/// 上限付きでストリームを読み切る
async fn read_limited<S, E>(mut stream: S, limit: usize) -> Result<Vec<u8>, PredictError>
where
    S: Stream<Item = Result<web::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| PredictError::Decode(format!("リクエストの読み込みエラー: {}", e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(PredictError::Decode(format!(
                "アップロードが大きすぎます (上限 {} バイト)",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// アップロードされた画像のバイト列を取り出す
///
/// `multipart/form-data` ならファイルパート（ファイル名付き、または名前が
/// `file` / `image`）の最初の1つ。それ以外はボディ全体をそのまま使う。
async fn read_upload(req: &HttpRequest, payload: web::Payload) -> Result<Vec<u8>, PredictError> {
    let limit = upload_limit(req);
    if !req.content_type().eq_ignore_ascii_case("multipart/form-data") {
        return read_limited(payload, limit).await;
    }

    let mut multipart = Multipart::new(req.headers(), payload);
    while let Some(field) = multipart.next().await {
        let field =
            field.map_err(|e| PredictError::Decode(format!("multipartの解析に失敗: {}", e)))?;
        let is_file = field.content_disposition().is_some_and(|cd| {
            cd.get_filename().is_some() || matches!(cd.get_name(), Some("file") | Some("image"))
        });

        let data = read_limited(field, limit).await?;
        if is_file {
            return Ok(data);
        }
    }

    Err(PredictError::Decode(
        "multipartにファイルが含まれていません".to_string(),
    ))
}

/// JSONボディの読み込み設定（失敗時も `{"detail": ...}` で返す）
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            PredictError::Decode(format!("JSONの解析に失敗: {}", err)).into()
        })
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "pub_detector API OK" }))
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let ready = state.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    HttpResponse::build(status).json(HealthOut { ready })
}

async fn predict(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, PredictError> {
    let body = read_upload(&req, payload).await?;
    let state = state.into_inner();
    let out = run_blocking(move || predict_commands::predict_upload(&state, &body)).await?;
    Ok(HttpResponse::Ok().json(out))
}

async fn predict_base64(
    state: web::Data<AppState>,
    input: web::Json<ImageInput>,
) -> Result<HttpResponse, PredictError> {
    let state = state.into_inner();
    let input = input.into_inner();
    let out = run_blocking(move || predict_commands::predict_base64(&state, &input)).await?;
    Ok(HttpResponse::Ok().json(out))
}

async fn upload_image(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> Result<HttpResponse, PredictError> {
    let body = read_upload(&req, payload).await?;
    let state = state.into_inner();
    let out = run_blocking(move || predict_commands::upload_image(&state, &body)).await?;
    Ok(HttpResponse::Ok().json(out))
}

async fn save_prediction(
    state: web::Data<AppState>,
    prediction: web::Json<PredictionCreate>,
) -> Result<HttpResponse, PredictError> {
    let state = state.into_inner();
    let prediction = prediction.into_inner();
    let out = run_blocking(move || predict_commands::save_prediction(&state, prediction)).await?;
    Ok(HttpResponse::Ok().json(out))
}

/// ルート定義
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/predict", web::post().to(predict))
        .route("/predict/base64", web::post().to(predict_base64))
        .route("/upload-image", web::post().to(upload_image))
        .route("/save-prediction", web::post().to(save_prediction));
}

/// サーバを起動して終了まで待つ
pub async fn serve(state: web::Data<AppState>, settings: &ServerSettings) -> anyhow::Result<()> {
    let max_upload = settings.max_upload_bytes;

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(web::Data::new(UploadLimit(max_upload)))
            .app_data(json_config(max_upload))
            .configure(configure)
    });
    if let Some(workers) = settings.workers {
        server = server.workers(workers);
    }

    log::info!(
        "Server running at http://{}:{}",
        settings.host,
        settings.port
    );
    server
        .bind((settings.host.as_str(), settings.port))?
        .run()
        .await?;
    Ok(())
}
