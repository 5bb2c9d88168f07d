use parallax::{
    build_background, build_foreground, codec, compose_scene, EncodeFormat, HttpMattingService,
    LayerOpacity, LocalSegmenter, MattingService, PipelineError, PipelineState, ProcessingConfig,
    Raster, RemoteSegmentationError, RemoteSegmenter, RenderPipeline,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn photo(width: u32, height: u32) -> Raster {
    Raster::from_fn(width, height, |x, y| {
        [(x * 7 % 256) as u8, (y * 11 % 256) as u8, 90, 255]
    })
    .unwrap()
}

fn png(raster: &Raster) -> Vec<u8> {
    codec::encode(raster, EncodeFormat::Png).unwrap()
}

/// Service that always answers with an HTTP status.
struct StatusService(u16);

impl MattingService for StatusService {
    async fn remove_background(&self, _image: Vec<u8>) -> Result<Vec<u8>, RemoteSegmentationError> {
        Err(RemoteSegmentationError::Status(self.0))
    }
}

/// Service that always answers with the same encoded image.
struct MattedService(Vec<u8>);

impl MattingService for MattedService {
    async fn remove_background(&self, _image: Vec<u8>) -> Result<Vec<u8>, RemoteSegmentationError> {
        Ok(self.0.clone())
    }
}

/// Service that never answers.
struct SilentService;

impl MattingService for SilentService {
    async fn remove_background(&self, _image: Vec<u8>) -> Result<Vec<u8>, RemoteSegmentationError> {
        std::future::pending().await
    }
}

/// Accept one HTTP request, answer 503 and hand back what was received.
async fn unavailable_server() -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/v1.0/removebg", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let read = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf)).await;
            match read {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => request.extend_from_slice(&buf[..n]),
                Ok(Err(err)) => panic!("read failed: {err}"),
            }
            if request_complete(&request) {
                break;
            }
        }

        stream
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        stream.shutdown().await.ok();

        String::from_utf8_lossy(&request).to_lowercase()
    });

    (endpoint, handle)
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        });

    match length {
        Some(length) => request.len() >= header_end + 4 + length,
        None => false,
    }
}

#[tokio::test]
async fn unavailable_service_falls_back_to_local_layers() {
    let original = photo(48, 32);
    let segmenter = RemoteSegmenter::new(StatusService(503)).with_fallback(Some(LocalSegmenter::new()));
    let pipeline = RenderPipeline::with_segmenter(ProcessingConfig::default(), segmenter);
    let states = pipeline.subscribe();

    let layers = pipeline.run(png(&original)).await.unwrap();

    assert_eq!(*states.borrow(), PipelineState::Ready);
    let mask = LocalSegmenter::new().mask(48, 32).unwrap();
    assert_eq!(layers.foreground(), &build_foreground(&original, &mask).unwrap());
    assert_eq!(layers.background(), &build_background(&original.opaque(), 20));
}

#[tokio::test]
async fn matted_response_is_foreground_and_original_is_blurred() {
    let original = photo(36, 24);
    let matted = Raster::from_fn(36, 24, |x, _| {
        if x < 18 {
            [0, 200, 10, 255]
        } else {
            [0, 0, 0, 0]
        }
    })
    .unwrap();
    let segmenter = RemoteSegmenter::new(MattedService(png(&matted))).with_fallback(None);
    let pipeline = RenderPipeline::with_segmenter(ProcessingConfig::default(), segmenter);
    let states = pipeline.subscribe();

    let layers = pipeline.run(png(&original)).await.unwrap();

    assert_eq!(*states.borrow(), PipelineState::Ready);
    assert_eq!(layers.foreground(), &matted);
    assert_eq!(layers.background(), &build_background(&original.opaque(), 20));
    assert_ne!(layers.background(), &build_background(&matted.opaque(), 20));
}

#[tokio::test]
async fn http_service_sends_form_and_key_then_falls_back() {
    let (endpoint, server) = unavailable_server().await;
    let service = HttpMattingService::new(endpoint, Some("test-key".into())).unwrap();

    let err = service.remove_background(png(&photo(6, 4))).await.unwrap_err();
    assert!(matches!(err, RemoteSegmentationError::Status(503)), "{err}");

    let request = server.await.unwrap();
    assert!(request.starts_with("post /v1.0/removebg"));
    assert!(request.contains("x-api-key: test-key"));
    assert!(request.contains("name=\"image_file\""));
    assert!(request.contains("name=\"size\""));
    assert!(request.contains("auto"));
}

#[tokio::test]
async fn configured_remote_pipeline_survives_unavailable_service() {
    let (endpoint, server) = unavailable_server().await;
    let config = ProcessingConfig::from_toml_str(&format!(
        "[remote]\nendpoint = \"{endpoint}\"\napi_key = \"test-key\"\ntimeout_secs = 5\n"
    ))
    .unwrap();

    let layers = RenderPipeline::new(config).run(png(&photo(20, 20))).await.unwrap();
    server.await.unwrap();

    assert_eq!(layers.dimensions(), (20, 20));
    assert_eq!(layers.foreground().pixel(10, 10)[3], 255);
    assert_eq!(layers.foreground().pixel(0, 0)[3], 0);
}

#[tokio::test]
async fn garbage_bytes_fail_to_decode() {
    let pipeline = RenderPipeline::with_segmenter(ProcessingConfig::default(), LocalSegmenter::new());
    let states = pipeline.subscribe();

    let err = pipeline.run(vec![0x13, 0x37, 0x00, 0xFF]).await.unwrap_err();

    assert!(matches!(err, PipelineError::Decode(_)));
    assert_eq!(*states.borrow(), PipelineState::Failed);
}

#[tokio::test]
async fn cancelling_during_remote_call_abandons_run() {
    let token = CancellationToken::new();
    let segmenter = RemoteSegmenter::new(SilentService).with_timeout(Duration::from_secs(60));
    let pipeline = RenderPipeline::with_segmenter(ProcessingConfig::default(), segmenter)
        .with_cancellation(token.clone());

    let mut states = pipeline.subscribe();
    let watcher = tokio::spawn(async move {
        states
            .wait_for(|state| *state == PipelineState::Segmenting)
            .await
            .unwrap();
        token.cancel();
        states
    });

    let err = pipeline.run(png(&photo(10, 10))).await.unwrap_err();
    let states = watcher.await.unwrap();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(*states.borrow(), PipelineState::Segmenting);
}

#[tokio::test]
async fn foreground_is_drawn_over_overlay() {
    let original = Raster::filled(40, 40, [255, 0, 0, 255]).unwrap();
    let layers = RenderPipeline::with_segmenter(ProcessingConfig::default(), LocalSegmenter::new())
        .run(png(&original))
        .await
        .unwrap();
    let overlay = Raster::filled(4, 4, [0, 0, 255, 255]).unwrap();

    let scene = compose_scene(&layers, Some(&overlay), (40, 40), LayerOpacity::default()).unwrap();

    let center = scene.get_pixel(20, 20).0;
    assert!(center[0] > 250 && center[2] < 5, "{center:?}");
    let corner = scene.get_pixel(1, 1).0;
    assert!(corner[2] > 250 && corner[0] < 5, "{corner:?}");

    let without_overlay = compose_scene(&layers, None, (40, 40), LayerOpacity::default()).unwrap();
    let corner = without_overlay.get_pixel(1, 1).0;
    assert!(corner[0] > 250 && corner[3] == 255, "{corner:?}");
}
