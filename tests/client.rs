use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ghibli_studio::encoding::decode_data_url;
use ghibli_studio::{ClientError, ImageClient, ImageOperations};
use serde_json::{json, Value};

const PNG_BYTES: [u8; 16] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

#[derive(Clone)]
enum SubmitReply {
    ImageUrl,
    Raw(StatusCode, String),
}

struct Script {
    submit: SubmitReply,
    image_status: StatusCode,
    content_type: &'static str,
    image: Vec<u8>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            submit: SubmitReply::ImageUrl,
            image_status: StatusCode::OK,
            content_type: "image/png",
            image: PNG_BYTES.to_vec(),
        }
    }
}

struct FakeServer {
    base: String,
    script: Script,
    submissions: Mutex<Vec<(String, Value)>>,
    fetches: AtomicUsize,
}

impl FakeServer {
    fn submissions(&self) -> Vec<(String, Value)> {
        self.submissions.lock().unwrap().clone()
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

async fn submit(
    State(fake): State<Arc<FakeServer>>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Response {
    fake.submissions
        .lock()
        .unwrap()
        .push((uri.path().to_string(), body));
    match &fake.script.submit {
        SubmitReply::ImageUrl => {
            Json(json!({ "imageUrl": format!("{}/files/result", fake.base) })).into_response()
        }
        SubmitReply::Raw(status, body) => (*status, body.clone()).into_response(),
    }
}

async fn download(State(fake): State<Arc<FakeServer>>) -> Response {
    fake.fetches.fetch_add(1, Ordering::SeqCst);
    (
        fake.script.image_status,
        [(header::CONTENT_TYPE, fake.script.content_type)],
        fake.script.image.clone(),
    )
        .into_response()
}

async fn spawn(script: Script) -> (ImageClient, Arc<FakeServer>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let fake = Arc::new(FakeServer {
        base: base.clone(),
        script,
        submissions: Mutex::new(Vec::new()),
        fetches: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/generate-image", post(submit))
        .route("/edit-image", post(submit))
        .route("/files/result", get(download))
        .with_state(fake.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (ImageClient::new(base), fake)
}

#[tokio::test]
async fn generate_returns_downloaded_image_as_data_url() {
    let (client, fake) = spawn(Script::default()).await;

    let data_url = client.generate_or_transform("", "a cat").await.unwrap();

    assert!(data_url.starts_with("data:image/png;base64,"));
    assert_eq!(decode_data_url(&data_url).unwrap(), PNG_BYTES.to_vec());
    assert_eq!(fake.fetches(), 1);

    let submissions = fake.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, "/generate-image");
    assert_eq!(submissions[0].1, json!({ "prompt": "a cat" }));
}

#[tokio::test]
async fn edit_posts_source_to_edit_endpoint() {
    let (client, fake) = spawn(Script::default()).await;

    let source = "data:image/png;base64,AQID";
    client.edit_existing(source, "add snow").await.unwrap();

    let submissions = fake.submissions();
    assert_eq!(submissions[0].0, "/edit-image");
    assert_eq!(
        submissions[0].1,
        json!({ "prompt": "add snow", "sourceImage": source })
    );
}

#[tokio::test]
async fn missing_image_url_skips_download() {
    let (client, fake) = spawn(Script {
        submit: SubmitReply::Raw(StatusCode::OK, "{}".into()),
        ..Script::default()
    })
    .await;

    let err = client.generate_or_transform("", "a cat").await.unwrap_err();

    assert!(matches!(err, ClientError::MissingImageUrl));
    assert_eq!(err.to_string(), "No image URL returned from API");
    assert_eq!(fake.fetches(), 0);
}

#[tokio::test]
async fn server_error_message_is_surfaced() {
    let (client, fake) = spawn(Script {
        submit: SubmitReply::Raw(
            StatusCode::BAD_REQUEST,
            json!({ "error": "Prompt is required" }).to_string(),
        ),
        ..Script::default()
    })
    .await;

    let err = client.generate_or_transform("", "").await.unwrap_err();

    match err {
        ClientError::Request(message) => assert_eq!(message, "Prompt is required"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fake.fetches(), 0);
}

#[tokio::test]
async fn unreadable_error_body_falls_back_to_generic_message() {
    let (client, _fake) = spawn(Script {
        submit: SubmitReply::Raw(StatusCode::BAD_GATEWAY, "upstream down".into()),
        ..Script::default()
    })
    .await;

    let err = client.edit_existing("AQID", "dusk").await.unwrap_err();

    match err {
        ClientError::Request(message) => assert_eq!(message, "Failed to edit image"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn failed_download_is_a_fetch_error() {
    let (client, _fake) = spawn(Script {
        image_status: StatusCode::NOT_FOUND,
        ..Script::default()
    })
    .await;

    let err = client.generate_or_transform("", "a cat").await.unwrap_err();

    match err {
        ClientError::Fetch(message) => assert_eq!(message, "Failed to fetch generated image"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn untyped_download_is_sniffed() {
    let (client, _fake) = spawn(Script {
        content_type: "application/octet-stream",
        ..Script::default()
    })
    .await;

    let data_url = client.generate_or_transform("", "a cat").await.unwrap();
    assert!(data_url.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn unrecognized_download_is_a_conversion_error() {
    let (client, _fake) = spawn(Script {
        content_type: "text/plain",
        image: b"definitely not pixels".to_vec(),
        ..Script::default()
    })
    .await;

    let err = client.generate_or_transform("", "a cat").await.unwrap_err();
    assert!(matches!(err, ClientError::Conversion(_)));
}
