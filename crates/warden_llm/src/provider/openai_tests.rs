use pretty_assertions::assert_eq;
use serde_json::json;
use warden_conversation::ToolCallResponse;
use warden_tool::ToolParameter;

use super::*;

fn provider(base: &str) -> OpenAiCompatible {
    OpenAiCompatible::new(
        Url::parse(base).unwrap(),
        DEFAULT_MODEL,
        "secret",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[test]
fn test_endpoint() {
    assert_eq!(
        provider(DEFAULT_BASE_URL).endpoint().unwrap().as_str(),
        "https://api.deepseek.com/chat/completions"
    );
    assert_eq!(
        provider("http://localhost:8080/v1/").endpoint().unwrap().as_str(),
        "http://localhost:8080/v1/chat/completions"
    );
}

#[test]
fn test_headers() {
    let headers = provider(DEFAULT_BASE_URL).build_headers().unwrap();
    assert_eq!(headers[AUTHORIZATION], "Bearer secret");
    assert_eq!(headers[CONTENT_TYPE], "application/json");
}

#[test]
fn test_build_request() {
    let call = ToolCallRequest::new(
        "call_1",
        "handleSql",
        Map::from_iter([("query".to_owned(), json!("SELECT 1"))]),
    );

    let query = ChatQuery::new(
        vec![
            Message::system("You are a helpful assistant."),
            Message::user("How many artists?"),
            Message::assistant("", vec![call]),
            Message::tool(ToolCallResponse::error("call_1", "no such table: Artist")),
            Message::assistant("There is no Artist table.", vec![]),
        ],
        vec![
            ToolDefinition::new("handleSql")
                .with_description("Run a query.")
                .with_parameter("query", ToolParameter::string("The query.").required()),
        ],
    );

    let request = serde_json::to_value(build_request(DEFAULT_MODEL, &query)).unwrap();
    assert_eq!(
        request,
        json!({
            "model": "deepseek-chat",
            "messages": [
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": "How many artists?" },
                {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "handleSql",
                            "arguments": r#"{"query":"SELECT 1"}"#,
                        },
                    }],
                },
                {
                    "role": "tool",
                    "tool_call_id": "call_1",
                    "content": "Error: no such table: Artist",
                },
                { "role": "assistant", "content": "There is no Artist table." },
            ],
            "tools": [{
                "type": "function",
                "function": {
                    "name": "handleSql",
                    "description": "Run a query.",
                    "parameters": {
                        "type": "object",
                        "properties": {
                            "query": { "type": "string", "description": "The query." },
                        },
                        "additionalProperties": false,
                        "required": ["query"],
                    },
                },
            }],
        })
    );
}

#[test]
fn test_build_request_omits_empty_tools() {
    let query = ChatQuery::new(vec![Message::user("hi")], vec![]);
    let request = serde_json::to_value(build_request("m", &query)).unwrap();

    assert!(request.get("tools").is_none());
}

#[test]
fn test_parse_response_with_tool_calls() {
    let response: types::Response = serde_json::from_value(json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {
                        "id": "call_a",
                        "type": "function",
                        "function": {
                            "name": "createSql",
                            "arguments": r#"{"query":"INSERT INTO Artist (Name) VALUES ('蔡徐坤')"}"#,
                        },
                    },
                    {
                        "id": "call_b",
                        "type": "function",
                        "function": { "name": "getWeather", "arguments": "not json" },
                    },
                ],
            },
        }],
    }))
    .unwrap();

    let reply = parse_response(response).unwrap();
    assert_eq!(reply.content, "");
    assert_eq!(reply.tool_calls.len(), 2);
    assert_eq!(
        reply.tool_calls[0].str_argument("query"),
        Some("INSERT INTO Artist (Name) VALUES ('蔡徐坤')")
    );
    assert!(reply.tool_calls[1].arguments.is_empty());
}

#[test]
fn test_parse_response_text() {
    let response: types::Response = serde_json::from_value(json!({
        "choices": [{ "message": { "content": "Hello!" } }],
    }))
    .unwrap();

    assert_eq!(parse_response(response).unwrap(), Reply::text("Hello!"));
}

#[test]
fn test_parse_response_without_choices() {
    let response: types::Response = serde_json::from_value(json!({ "choices": [] })).unwrap();
    assert_eq!(parse_response(response), Err(Error::EmptyResponse));
}

#[test]
fn test_parse_arguments() {
    assert_eq!(parse_arguments("t", ""), Map::new());
    assert_eq!(parse_arguments("t", "[1]"), Map::new());
    assert_eq!(
        parse_arguments("t", r#"{"location":"Beijing"}"#),
        Map::from_iter([("location".to_owned(), json!("Beijing"))])
    );
}
