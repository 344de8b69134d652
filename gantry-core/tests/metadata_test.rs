use gantry_core::metadata::Metadata;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use std::str::FromStr;

fn headers(entries: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in entries {
        map.append(
            HeaderName::from_str(name).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

#[test]
fn only_prefixed_headers_are_projected() {
    let headers = headers(&[
        ("Grpc-Metadata-X-User", "alice"),
        ("Content-Type", "application/json"),
        ("X-Access-Token", "secret"),
    ]);

    let md = Metadata::from_headers(&headers);

    assert_eq!(md.get("x-user"), Some(&["alice".to_string()][..]));
    assert!(md.get("content-type").is_none());
    assert!(md.get("x-access-token").is_none());
}

#[test]
fn multi_valued_headers_are_preserved_in_order() {
    let headers = headers(&[
        ("Grpc-Metadata-X-Tag", "one"),
        ("Grpc-Metadata-X-Tag", "two"),
    ]);

    let md = Metadata::from_headers(&headers);

    assert_eq!(
        md.get("x-tag"),
        Some(&["one".to_string(), "two".to_string()][..]),
    );
}

#[test]
fn projection_is_its_own_inverse_on_prefixed_headers() {
    let original = headers(&[
        ("Grpc-Metadata-X-User", "alice"),
        ("Grpc-Metadata-X-Tag", "one"),
        ("Grpc-Metadata-X-Tag", "two"),
    ]);

    let md = Metadata::from_headers(&original);
    let round_tripped = Metadata::from_headers(&headers(
        &md.to_headers()
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
            .collect::<Vec<_>>(),
    ));

    assert_eq!(md, round_tripped);
}

#[test]
fn conversion_to_tonic_metadata_keeps_every_value() {
    let mut md = Metadata::new();
    md.insert("x-user", "alice");
    md.insert("x-tag", "one");
    md.insert("x-tag", "two");

    let map = md.to_metadata_map();

    assert_eq!(map.get("x-user").unwrap(), "alice");
    let tags: Vec<_> = map.get_all("x-tag").iter().collect();
    assert_eq!(tags.len(), 2);
}

#[test]
fn response_metadata_capture_round_trips() {
    let mut md = Metadata::new();
    md.insert("x-request-id", "abc123");

    let captured = Metadata::from_metadata_map(&md.to_metadata_map());

    assert_eq!(captured, md);
}
