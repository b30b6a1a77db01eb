//! Full plugin chain: files in, relation queries out.

use gransk_core::{Payload, Pipeline, Related, SetupContext, Subscriber};
use gransk_extractor::{ArchiveUnpacker, FileMeta, PlainText, StoreFile, TikaExtractor};
use gransk_relations::{
    EntityDetector, entity_network_plugin, related_documents_plugin, related_entities_plugin,
};
use gransk_shared::{Document, GranskConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMAIL: &str = "email:ola@example.no";
const IPV4: &str = "ipv4:10.0.0.1";
const HASHTAG: &str = "hashtag:#leak";

fn config(dir: &tempfile::TempDir, tika_url: &str) -> GranskConfig {
    let mut config = GranskConfig {
        data_root: dir.path().display().to_string(),
        ..Default::default()
    };
    config.extractor.url = tika_url.to_string();
    config.tools.pdfinfo = "/nonexistent/pdfinfo".into();
    config.tools.pdfimages = "/nonexistent/pdfimages".into();
    config.tools.ghostscript = "/nonexistent/gs".into();
    config
}

async fn pipeline(config: &GranskConfig) -> Pipeline {
    let plugins: Vec<Box<dyn Subscriber>> = vec![
        Box::new(StoreFile::new()),
        Box::new(FileMeta),
        Box::new(PlainText),
        Box::new(ArchiveUnpacker::new()),
        Box::new(TikaExtractor::new()),
        Box::new(EntityDetector),
        Box::new(related_entities_plugin()),
        Box::new(related_documents_plugin()),
        Box::new(entity_network_plugin()),
    ];
    Pipeline::build(&SetupContext::new(config.clone()), plugins)
        .await
        .unwrap()
}

fn tar_of(name: &str, data: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data.as_bytes()).unwrap();
    builder.into_inner().unwrap()
}

async fn ingest(pipeline: &Pipeline, name: &str, bytes: Vec<u8>) -> (String, usize) {
    let mut doc = Document::get_document(name, None, false).unwrap();
    let report = pipeline.add_file(&mut doc, Payload::new(bytes)).await.unwrap();
    assert!(report.is_clean(), "{name}: {:?}", report.failures);
    (doc.id.to_string(), report.documents)
}

fn related(pipeline: &Pipeline, service: &str, id: &str) -> Vec<Related> {
    pipeline
        .get_service(service)
        .unwrap()
        .get_related_to(id)
        .unwrap()
}

fn ids(related: &[Related]) -> Vec<&str> {
    let mut ids: Vec<&str> = related.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn ingest_query_persist_and_clear() {
    let tika = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tika"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Author: ola@example.no"))
        .expect(1)
        .mount(&tika)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, &tika.uri());
    let first = pipeline(&config).await;

    let (a, n) = ingest(
        &first,
        "a.txt",
        b"contact ola@example.no about 10.0.0.1".to_vec(),
    )
    .await;
    assert_eq!(n, 1);
    let (b, _) = ingest(&first, "b.txt", b"ola@example.no wrote #leak".to_vec()).await;
    let (_, n) = ingest(
        &first,
        "bundle.tar",
        tar_of("notes/c.txt", "see 10.0.0.1 and #leak"),
    )
    .await;
    assert_eq!(n, 2);
    let (pdf, _) = ingest(&first, "report.pdf", b"%PDF-1.4 not really".to_vec()).await;

    // Entities
    assert_eq!(
        related(&first, "related_entities", EMAIL),
        vec![
            Related { id: HASHTAG.into(), weight: 1 },
            Related { id: IPV4.into(), weight: 1 },
        ]
    );
    assert_eq!(ids(&related(&first, "related_entities", IPV4)), vec![EMAIL, HASHTAG]);

    // Documents: a shares the email with b and the pdf, the address with c.
    let for_a = related(&first, "related_documents", &a);
    assert_eq!(for_a.len(), 3);
    assert!(for_a.iter().all(|r| r.weight == 1));
    assert!(for_a.iter().any(|r| r.id == b));
    assert!(for_a.iter().any(|r| r.id == pdf));
    assert!(related(&first, "related_documents", "unknown").is_empty());

    // Network
    let network = first
        .get_service("entity_network")
        .unwrap()
        .get_for(EMAIL, 1)
        .unwrap();
    assert_eq!(network.nodes.len(), 3);
    assert_eq!(network.nodes[0].id, EMAIL);
    assert_eq!(network.links.len(), 3);

    assert!(config.files_dir().join("txt").is_dir());
    first.save_all().await.unwrap();
    let saved: Vec<_> = first
        .injector()
        .snapshot_store()
        .await
        .unwrap()
        .list_snapshots()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.service)
        .collect();
    assert_eq!(saved, vec!["entity_network", "related_documents", "related_entities"]);
    first.stop().await;
    drop(first);

    // A fresh pipeline sees nothing until it loads the snapshots.
    let second = pipeline(&config).await;
    assert!(related(&second, "related_entities", EMAIL).is_empty());
    second.load_all().await.unwrap();
    assert_eq!(related(&second, "related_entities", EMAIL).len(), 2);
    assert_eq!(related(&second, "related_documents", &a), for_a);
    assert_eq!(
        second
            .get_service("entity_network")
            .unwrap()
            .get_for(EMAIL, 1)
            .unwrap(),
        network
    );

    second.clear_all().await.unwrap();
    assert!(related(&second, "related_entities", EMAIL).is_empty());
    assert!(related(&second, "related_documents", &a).is_empty());
    assert!(!config.files_dir().exists());

    // Cleared snapshots stay cleared.
    let third = pipeline(&config).await;
    third.load_all().await.unwrap();
    assert!(related(&third, "related_entities", EMAIL).is_empty());
}

#[tokio::test]
async fn reingesting_a_file_does_not_inflate_weights() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&config(&dir, "http://127.0.0.1:9")).await;

    for _ in 0..3 {
        ingest(&pipeline, "same.txt", b"ola@example.no 10.0.0.1".to_vec()).await;
    }

    assert_eq!(
        related(&pipeline, "related_entities", EMAIL),
        vec![Related { id: IPV4.into(), weight: 1 }]
    );
}

#[tokio::test]
async fn reingesting_changed_content_replaces_relations() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&config(&dir, "http://127.0.0.1:9")).await;
    let network = |id: &str| {
        pipeline
            .get_service("entity_network")
            .unwrap()
            .get_for(id, 1)
            .unwrap()
    };

    ingest(&pipeline, "same.txt", b"ola@example.no 10.0.0.1".to_vec()).await;
    ingest(&pipeline, "same.txt", b"ola@example.no #leak".to_vec()).await;

    assert_eq!(
        related(&pipeline, "related_entities", EMAIL),
        vec![Related { id: HASHTAG.into(), weight: 1 }]
    );
    assert!(related(&pipeline, "related_entities", IPV4).is_empty());
    assert!(network(IPV4).nodes.is_empty());
    let ids: Vec<_> = network(EMAIL).nodes.into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![EMAIL, HASHTAG]);

    let (other, _) = ingest(&pipeline, "other.txt", b"cc ola@example.no".to_vec()).await;
    assert_eq!(related(&pipeline, "related_documents", &other).len(), 1);

    // Nothing detected any more: the file stops contributing.
    let (same, _) = ingest(&pipeline, "same.txt", b"nothing to see".to_vec()).await;
    assert!(related(&pipeline, "related_entities", EMAIL).is_empty());
    assert!(related(&pipeline, "related_documents", &other).is_empty());
    assert!(related(&pipeline, "related_documents", &same).is_empty());
    assert!(network(HASHTAG).nodes.is_empty());
    assert_eq!(network(EMAIL).nodes.len(), 1);
}

#[tokio::test]
async fn entity_seen_alone_is_a_single_node_network() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&config(&dir, "http://127.0.0.1:9")).await;
    ingest(&pipeline, "lone.txt", b"write to ola@example.no".to_vec()).await;

    let network = pipeline
        .get_service("entity_network")
        .unwrap()
        .get_for(EMAIL, 2)
        .unwrap();
    assert_eq!(network.nodes.len(), 1);
    assert_eq!(network.nodes[0].id, EMAIL);
    assert_eq!(network.nodes[0].hops, 0);
    assert!(network.links.is_empty());
}

#[tokio::test]
async fn missing_service_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&config(&dir, "http://127.0.0.1:9")).await;
    assert!(pipeline.get_service("nope").is_none());
    assert!(
        pipeline
            .get_service("related_entities")
            .unwrap()
            .get_for(EMAIL, 1)
            .is_err()
    );
}
