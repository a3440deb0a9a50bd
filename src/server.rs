use crate::error::{Error, Result};
use crate::registry::CsvReferenceList;
use crate::session::{Recognition, Session};
use bytes::Buf;
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use warp::filters::multipart::{FormData, Part};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct RegistrySummary {
    plates: usize,
}

pub async fn run(session: Arc<Session>, port: u16, shutdown: impl Future<Output = ()> + Send + 'static) {
    let (addr, server) =
        warp::serve(routes(session)).bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown);
    info!("Listening on {}", addr);
    server.await;
}

pub fn routes(
    session: Arc<Session>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let with_session = warp::any().map(move || session.clone());

    let recognize = warp::post()
        .and(warp::path!("recognize"))
        .and(warp::filters::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_session.clone())
        .and_then(|form: FormData, session: Arc<Session>| async move {
            Ok::<_, Infallible>(respond(handle_recognize(form, session).await))
        });
    let upload_registry = warp::post()
        .and(warp::path!("registry"))
        .and(warp::filters::multipart::form().max_length(MAX_UPLOAD_BYTES))
        .and(with_session.clone())
        .and_then(|form: FormData, session: Arc<Session>| async move {
            Ok::<_, Infallible>(respond(handle_registry_upload(form, session).await))
        });
    let show_registry = warp::get()
        .and(warp::path!("registry"))
        .and(with_session)
        .map(|session: Arc<Session>| {
            respond(Ok(RegistrySummary {
                plates: session.registry().len(),
            }))
        });

    recognize.or(upload_registry).or(show_registry)
}

fn respond<T: Serialize>(result: Result<T>) -> WithStatus<Json> {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK),
        Err(e) => {
            error!("Error handling request: {}", e);
            let status = match e {
                Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Error::CollaboratorUnavailable { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warp::reply::with_status(warp::reply::json(&json!({ "error": e.to_string() })), status)
        }
    }
}

async fn handle_recognize(mut form: FormData, session: Arc<Session>) -> Result<Recognition> {
    let mut upload: Option<Vec<u8>> = None;
    let mut location: Option<String> = None;

    while let Some(part) = form.next().await {
        let part = part.map_err(bad_form)?;
        let name = part.name().to_string();
        debug!("Got part {}", name);
        match name.as_str() {
            "upload" => upload = Some(read_part(part).await?),
            "location" => {
                let text = String::from_utf8_lossy(&read_part(part).await?).trim().to_string();
                location = Some(text).filter(|l| !l.is_empty());
            }
            _ => warn!("Ignoring part {}", name),
        }
    }

    let upload = upload.ok_or_else(|| Error::invalid_input("missing upload part"))?;
    info!("Recognizing {} byte image", upload.len());
    // Detector and OCR calls block; keep them off the reactor.
    tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&upload)
            .map_err(|e| Error::invalid_input(format!("unable to decode image: {}", e)))?;
        session.recognize(&image, location.as_deref())
    })
    .await
    .map_err(|e| Error::Internal(e.to_string()))?
}

async fn handle_registry_upload(mut form: FormData, session: Arc<Session>) -> Result<RegistrySummary> {
    let mut reference: Option<Vec<u8>> = None;

    while let Some(part) = form.next().await {
        let part = part.map_err(bad_form)?;
        let name = part.name().to_string();
        debug!("Got part {}", name);
        if name == "reference" {
            reference = Some(read_part(part).await?);
        } else {
            warn!("Ignoring part {}", name);
        }
    }

    let reference = reference.ok_or_else(|| Error::invalid_input("missing reference part"))?;
    let plates = session.rebuild_registry(&CsvReferenceList, &reference)?;
    Ok(RegistrySummary { plates })
}

async fn read_part(part: Part) -> Result<Vec<u8>> {
    let mut data: Vec<u8> = vec![];
    let mut stream = part.stream();
    while let Some(buf) = stream.next().await {
        data.extend_from_slice(buf.map_err(bad_form)?.bytes());
    }
    Ok(data)
}

fn bad_form(e: warp::Error) -> Error {
    Error::invalid_input(format!("malformed multipart body: {}", e))
}
