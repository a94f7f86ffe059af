use cardproxy_pdf::cache::{FileCache, METADATA_KEY};
use cardproxy_pdf::layout::Placement;
use cardproxy_pdf::{run, run_with_renderer, DocumentRenderer, ImageKind, ProxyConfig, ProxyError};
use printpdf::image_crate::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Test fixtures - sample catalog and deck

const ARAGORN: &str = "51223bd0-ffd1-11df-a976-0801200c9001";
const GLORFINDEL: &str = "51223bd0-ffd1-11df-a976-0801200c9005";
const GANDALF: &str = "51223bd0-ffd1-11df-a976-0801200c9073";
const UNKNOWN: &str = "00000000-0000-0000-0000-000000000000";

const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn catalog_body() -> String {
    format!(
        r#"[
            {{"octgnid": "{}", "imagesrc": "/bundles/cards/01001.png", "name": "Aragorn"}},
            {{"octgnid": "{}", "imagesrc": "/bundles/cards/01005.png", "name": "Glorfindel"}},
            {{"octgnid": "{}", "imagesrc": "/bundles/cards/01073.png", "name": "Gandalf"}},
            {{"octgnid": null, "imagesrc": "/bundles/cards/99999.png", "name": "Promo"}}
        ]"#,
        ARAGORN, GLORFINDEL, GANDALF
    )
}

/// Deck with 1 Aragorn, 1 Glorfindel and `gandalfs` Gandalf, plus any extra card lines
fn deck_xml(gandalfs: u32, extra: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<deck game="a21af4e8-be4b-4cda-a6b6-534f9717391f">
  <section name="Hero" shared="False">
    <card qty="1" id="{}">Aragorn</card>
    <card qty="1" id="{}">Glorfindel</card>
  </section>
  <section name="Ally" shared="False">
    <card qty="{}" id="{}">Gandalf</card>
    {}
  </section>
</deck>"#,
        ARAGORN, GLORFINDEL, gandalfs, GANDALF, extra
    )
}

/// Renderer that records what it was asked to draw and writes it as text
#[derive(Default)]
struct RecordingRenderer {
    registered: Vec<(String, ImageKind)>,
    pages: Vec<Vec<Placement>>,
}

impl DocumentRenderer for RecordingRenderer {
    fn register_image(&mut self, name: &str, kind: ImageKind, _bytes: &[u8]) -> cardproxy_pdf::Result<()> {
        self.registered.push((name.to_string(), kind));
        Ok(())
    }

    fn add_page(&mut self) -> cardproxy_pdf::Result<()> {
        self.pages.push(Vec::new());
        Ok(())
    }

    fn place_image(&mut self, placement: &Placement) -> cardproxy_pdf::Result<()> {
        match self.pages.last_mut() {
            Some(page) => {
                page.push(placement.clone());
                Ok(())
            }
            None => Err(ProxyError::Render("no page".to_string())),
        }
    }

    fn write_to(self, path: &Path) -> cardproxy_pdf::Result<()> {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            out.push_str(&format!("page {}:", i));
            for p in page {
                out.push_str(&format!(" {}@{},{}", p.asset_name, p.x_mm, p.y_mm));
            }
            out.push('\n');
        }
        std::fs::write(path, out)?;
        Ok(())
    }
}

struct Fixture {
    server: MockServer,
    dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
            dir: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> ProxyConfig {
        ProxyConfig {
            base_url: self.server.uri(),
            ..ProxyConfig::with_cache_dir(self.dir.path().join("cache"))
        }
    }

    fn cache(&self) -> FileCache {
        FileCache::new(self.dir.path().join("cache"))
    }

    fn write_deck(&self, xml: &str) -> PathBuf {
        let path = self.dir.path().join("deck.o8d");
        std::fs::write(&path, xml).unwrap();
        path
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("deck.out")
    }

    async fn mount_catalog(&self, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/api/public/cards/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(catalog_body()))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    async fn mount_image(&self, asset_name: &str, body: Vec<u8>, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/bundles/cards/{}", asset_name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn full_run_lays_out_every_copy() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;
    for asset in ["01001.png", "01005.png", "01073.png"] {
        fx.mount_image(asset, PNG_MAGIC.to_vec(), 1).await;
    }

    // 1 + 1 + 18 = 20 copies
    let input = fx.write_deck(&deck_xml(18, ""));
    let summary = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap();

    assert_eq!(summary.cards, 3);
    assert_eq!(summary.copies, 20);
    assert_eq!(summary.distinct_images, 3);
    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.pages, 3);

    let written = std::fs::read_to_string(fx.output()).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("page 0: 01001.png@8,4 01005.png@75.5,4 01073.png@143,4"));
    assert_eq!(lines[2], "page 2: 01073.png@8,4 01073.png@75.5,4");

    let cache = fx.cache();
    assert!(cache.exists(METADATA_KEY));
    assert!(cache.exists("images/01073.png"));
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;
    for asset in ["01001.png", "01005.png", "01073.png"] {
        fx.mount_image(asset, PNG_MAGIC.to_vec(), 1).await;
    }
    let input = fx.write_deck(&deck_xml(2, ""));

    let first = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap();
    let second = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap();

    // The mocks' expect(1) counts verify no second round of requests
    assert_eq!(first.fetched, 3);
    assert_eq!(second.fetched, 0);
    assert_eq!(second.pages, 1);
}

#[tokio::test]
async fn unknown_card_fails_before_any_image_request() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/bundles/cards/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_MAGIC.to_vec()))
        .expect(0)
        .mount(&fx.server)
        .await;

    let extra = format!(r#"<card qty="2" id="{}">Mystery</card>"#, UNKNOWN);
    let input = fx.write_deck(&deck_xml(1, &extra));

    let err = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap_err();
    match err {
        ProxyError::UnresolvedIdentifier(id) => assert_eq!(id, UNKNOWN),
        other => panic!("expected unresolved identifier, got {:?}", other),
    }
    assert!(!fx.output().exists());
}

#[tokio::test]
async fn failed_image_is_reported_and_siblings_are_cached() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;
    fx.mount_image("01001.png", PNG_MAGIC.to_vec(), 1).await;
    fx.mount_image("01005.png", PNG_MAGIC.to_vec(), 1).await;
    Mock::given(method("GET"))
        .and(path("/bundles/cards/01073.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&fx.server)
        .await;

    let input = fx.write_deck(&deck_xml(3, ""));
    let err = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("error(s) fetching images: 01073.png ("));
    assert!(!message.contains("01001.png"));
    assert!(fx.cache().exists("images/01001.png"));
    assert!(fx.cache().exists("images/01005.png"));
    assert!(!fx.output().exists());
}

#[tokio::test]
async fn catalog_outage_aborts_run() {
    let fx = Fixture::new().await;
    Mock::given(method("GET"))
        .and(path("/api/public/cards/"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&fx.server)
        .await;

    let input = fx.write_deck(&deck_xml(1, ""));
    let err = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::HttpStatus { .. }));
    assert!(!fx.output().exists());
}

#[tokio::test]
async fn unsupported_image_content_is_fatal() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;
    fx.mount_image("01001.png", PNG_MAGIC.to_vec(), 1).await;
    fx.mount_image("01005.png", b"GIF89a\x01\x00\x01\x00".to_vec(), 1).await;
    fx.mount_image("01073.png", PNG_MAGIC.to_vec(), 1).await;

    let input = fx.write_deck(&deck_xml(1, ""));
    let err = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap_err();
    match err {
        ProxyError::UnsupportedImage { asset, detected } => {
            assert_eq!(asset, "01005.png");
            assert_eq!(detected, "image/gif");
        }
        other => panic!("expected unsupported image, got {:?}", other),
    }
    assert!(!fx.output().exists());
}

#[tokio::test]
async fn malformed_deck_is_fatal() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;

    let input = fx.write_deck("<deck><section name=\"Hero\"><card qty=\"1\"");
    let err = run_with_renderer(&fx.config(), &input, &fx.output(), RecordingRenderer::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::Deck(_)));
}

#[tokio::test]
async fn run_writes_real_pdf() {
    let fx = Fixture::new().await;
    fx.mount_catalog(1).await;

    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 7, Rgb([10, 120, 40])));
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    for asset in ["01001.png", "01005.png", "01073.png"] {
        fx.mount_image(asset, png.clone(), 1).await;
    }

    let input = fx.write_deck(&deck_xml(10, ""));
    let output = fx.dir.path().join("deck.pdf");
    let summary = run(&fx.config(), &input, &output).await.unwrap();

    assert_eq!(summary.pages, 2);
    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    // 12 copies across two pages, three distinct images stored once each
    let doc = printpdf::lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
    let images = doc
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"Subtype")
                .and_then(|subtype| subtype.as_name())
                .map(|name| name == b"Image")
                .unwrap_or(false)
        })
        .count();
    assert_eq!(images, 3);
}
