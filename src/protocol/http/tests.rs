use super::*;

#[test]
fn decodes_a_get_request_with_no_body() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /accessories HTTP/1.1\r\nHost: x\r\n\r\n");

    let req = codec.decode().unwrap().unwrap();
    assert_eq!(req.method, Method::Get);
    assert_eq!(req.path, "/accessories");
    assert!(req.body.is_empty());
}

#[test]
fn decodes_a_put_request_with_content_length_body() {
    let mut codec = HttpServerCodec::new();
    let body = br#"{"characteristics":[{"aid":1,"iid":8,"value":1}]}"#;
    let head = format!("PUT /characteristics HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len());
    codec.feed(head.as_bytes());
    codec.feed(body);

    let req = codec.decode().unwrap().unwrap();
    assert_eq!(req.method, Method::Put);
    assert_eq!(req.body, body);
}

#[test]
fn waits_for_more_data_when_body_is_not_fully_buffered() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"PUT /characteristics HTTP/1.1\r\nContent-Length: 10\r\n\r\n12345");
    assert!(codec.decode().unwrap().is_none());

    codec.feed(b"67890");
    let req = codec.decode().unwrap().unwrap();
    assert_eq!(req.body, b"1234567890");
}

#[test]
fn parses_query_parameters_on_get_characteristics() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /characteristics?id=1.8,1.9&meta=1 HTTP/1.1\r\n\r\n");

    let req = codec.decode().unwrap().unwrap();
    assert_eq!(req.path, "/characteristics");
    assert_eq!(req.query.get("id").map(String::as_str), Some("1.8,1.9"));
    assert_eq!(req.query.get("meta").map(String::as_str), Some("1"));
}

#[test]
fn rejects_an_unknown_method() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"DELETE /accessories HTTP/1.1\r\n\r\n");
    assert!(matches!(codec.decode(), Err(ParseError::InvalidMethod(_))));
}

#[test]
fn pipelines_two_requests_in_one_buffer() {
    let mut codec = HttpServerCodec::new();
    codec.feed(b"GET /accessories HTTP/1.1\r\n\r\nGET /characteristics?id=1.8 HTTP/1.1\r\n\r\n");

    let first = codec.decode().unwrap().unwrap();
    assert_eq!(first.path, "/accessories");
    let second = codec.decode().unwrap().unwrap();
    assert_eq!(second.path, "/characteristics");
}

#[test]
fn encodes_a_json_ok_response_with_content_length() {
    let wire = ResponseBuilder::ok().json_body(b"{\"ok\":true}".to_vec()).encode();
    let text = String::from_utf8(wire).unwrap();
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Length: 12\r\n"));
    assert!(text.ends_with("{\"ok\":true}"));
}

#[test]
fn encodes_a_no_content_response_without_a_body() {
    let wire = ResponseBuilder::no_content().encode();
    let text = String::from_utf8(wire).unwrap();
    assert_eq!(text, "HTTP/1.1 204 No Content\r\n\r\n");
}

#[test]
fn encodes_an_event_message() {
    let wire = encode_event(b"{\"characteristics\":[]}");
    let text = String::from_utf8(wire).unwrap();
    assert!(text.starts_with("EVENT/1.0 200 OK\r\n"));
    assert!(text.contains("Transfer-Encoding: chunked\r\n"));
    assert!(text.ends_with("17\r\n{\"characteristics\":[]}\r\n0\r\n\r\n"));
}
