use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::job::{BatchDownload, BatchJob, ConvertResult};
use crate::request::{
    AnalyzeRequest, BatchCrawlRequest, CollectLinksRequest, ConvertRequest, CrawlRequest,
    ListRequest, NO_MODEL, ResultsRequest, StatusRequest, SubmitRequest,
};
use crate::result::{BatchLink, LinkCollection, PageCrawl};
use crate::stream::EventStream;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

const CRAWL_PATH: &str = "/api/v1/crawl";
const ANALYZE_PATH: &str = "/api/v1/analyze";
const COLLECT_LINKS_PATH: &str = "/api/v1/collect-links";
const BATCH_CRAWL_PATH: &str = "/api/v1/batch-crawl";
const LLM_CONVERT_PATH: &str = "/api/v1/llm-batch/convert";
const LLM_SUBMIT_PATH: &str = "/api/v1/llm-batch/submit";
const LLM_STATUS_PATH: &str = "/api/v1/llm-batch/status";
const LLM_RESULTS_PATH: &str = "/api/v1/llm-batch/results";
const LLM_LIST_PATH: &str = "/api/v1/llm-batch/list";

/// Answer to a link collection request. The collaborator either streams
/// events or returns the whole collection as one JSON body.
pub enum LinkFeed {
    Streamed(EventStream),
    Complete(LinkCollection),
}

#[derive(Debug, Deserialize)]
struct AnalyzeBody {
    #[serde(default)]
    result: String,
}

#[derive(Debug, Deserialize)]
struct BatchesBody {
    #[serde(default)]
    batches: Vec<BatchJob>,
}

/// HTTP client for every collaborator endpoint.
#[derive(Debug, Clone)]
pub struct CrawlClient {
    client: Client,
    config: ClientConfig,
}

impl CrawlClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        // No overall timeout on the client itself: streamed bodies stay open
        // for the whole collaborator run. Plain calls set one per request.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Single-page crawl with optional LLM extraction.
    pub async fn crawl_page(&self, request: &CrawlRequest) -> Result<PageCrawl> {
        info!(url = %request.url, model = %request.llm_model, "Requesting page crawl");
        self.post_json(CRAWL_PATH, request, "Failed to analyze the website")
            .await
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<String> {
        if request.content.trim().is_empty() {
            return Err(ClientError::Validation(
                "Content to analyze is empty".to_string(),
            ));
        }
        if request.llm_model.trim().is_empty() || request.llm_model == NO_MODEL {
            return Err(ClientError::Validation(
                "Analysis requires an LLM model".to_string(),
            ));
        }

        let body: AnalyzeBody = self
            .post_json(ANALYZE_PATH, request, "Analysis failed.")
            .await?;
        Ok(body.result)
    }

    pub async fn collect_links(&self, request: &CollectLinksRequest) -> Result<LinkFeed> {
        info!(
            url = %request.url,
            depth = request.depth,
            max_urls = request.max_urls,
            "Requesting link collection"
        );
        let response = self.post_streaming(COLLECT_LINKS_PATH, request).await?;

        if is_json(&response) {
            let value: Value = response.json().await?;
            let links: LinkCollection = check_envelope(value, "Failed to collect links")?;
            debug!(count = links.len(), "Link collection returned as one body");
            return Ok(LinkFeed::Complete(links));
        }

        Ok(LinkFeed::Streamed(EventStream::new(response.bytes_stream())))
    }

    /// Starts a batch crawl of `links`, writing one markdown file per link
    /// into `output_folder_name` on the collaborator side.
    pub async fn batch_crawl(
        &self,
        links: &[BatchLink],
        output_folder_name: &str,
    ) -> Result<EventStream> {
        if links.is_empty() {
            return Err(ClientError::Validation(
                "No links selected for batch crawl".to_string(),
            ));
        }

        info!(count = links.len(), folder = %output_folder_name, "Starting batch crawl");
        let request = BatchCrawlRequest {
            links: links.iter().map(BatchLink::labelled).collect(),
            output_folder_name: output_folder_name.to_string(),
        };
        let response = self.post_streaming(BATCH_CRAWL_PATH, &request).await?;

        if is_json(&response) {
            // An error envelope instead of a stream.
            let value: Value = response.json().await?;
            check_envelope::<Value>(value, "Batch crawl failed.")?;
            return Err(ClientError::Collaborator(
                "Batch crawl did not return an event stream".to_string(),
            ));
        }

        Ok(EventStream::new(response.bytes_stream()))
    }

    pub async fn llm_convert(&self, request: &ConvertRequest) -> Result<ConvertResult> {
        if request.folder_path.trim().is_empty() {
            return Err(ClientError::Validation(
                "A crawl output folder is required".to_string(),
            ));
        }
        self.post_json(LLM_CONVERT_PATH, request, "Conversion failed.")
            .await
    }

    pub async fn llm_submit(&self, jsonl_folder_path: &str) -> Result<Vec<BatchJob>> {
        if jsonl_folder_path.trim().is_empty() {
            return Err(ClientError::Submission(
                "No batch input folder given".to_string(),
            ));
        }

        let request = SubmitRequest { jsonl_folder_path };
        let body: BatchesBody = self
            .post_json(LLM_SUBMIT_PATH, &request, "Submit failed.")
            .await
            .map_err(|e| match e {
                ClientError::Collaborator(message) => ClientError::Submission(message),
                other => other,
            })?;

        info!(count = body.batches.len(), "Batch jobs submitted");
        Ok(body.batches)
    }

    pub async fn llm_status(&self, batch_ids: &[String]) -> Result<Vec<BatchJob>> {
        if batch_ids.is_empty() {
            return Ok(Vec::new());
        }

        let request = StatusRequest { batch_ids };
        let body: BatchesBody = self
            .post_json(LLM_STATUS_PATH, &request, "Failed to fetch status.")
            .await?;
        Ok(body.batches)
    }

    pub async fn llm_results(
        &self,
        batch_ids: &[String],
        output_folder_path: &str,
    ) -> Result<BatchDownload> {
        if batch_ids.is_empty() {
            return Err(ClientError::NotReady(
                "No completed batch jobs to download".to_string(),
            ));
        }

        let request = ResultsRequest {
            batch_ids,
            output_folder_path,
        };
        self.post_json(LLM_RESULTS_PATH, &request, "Failed to download results.")
            .await
    }

    pub async fn llm_list(&self, limit: usize) -> Result<Vec<BatchJob>> {
        let request = ListRequest { limit };
        let body: BatchesBody = self
            .post_json(LLM_LIST_PATH, &request, "Failed to fetch batches.")
            .await?;
        Ok(body.batches)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B, fallback: &str) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .timeout(self.config.timeout())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned {}", url, status);
            return Err(ClientError::HttpStatus(status.as_u16()));
        }

        let value: Value = response.json().await?;
        check_envelope(value, fallback)
    }

    async fn post_streaming<B>(&self, path: &str, body: &B) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.endpoint(path);
        debug!("POST {} (streaming)", url);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream, application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned {}", url, status);
            return Err(ClientError::HttpStatus(status.as_u16()));
        }

        Ok(response)
    }
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Maps a `success: false` envelope to a collaborator error, otherwise
/// decodes the body. Bodies without a `success` field are taken as is.
fn check_envelope<T: DeserializeOwned>(value: Value, fallback: &str) -> Result<T> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error_message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(fallback);
        return Err(ClientError::Collaborator(message.to_string()));
    }

    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::BatchStatus;
    use crate::stream::StreamEvent;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CrawlClient {
        CrawlClient::new(ClientConfig::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_crawl_page_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(CRAWL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "markdown": "# Title",
                "html": "<h1>Title</h1>",
                "structure": {"header": "Site", "ads": ["banner"]},
                "metadata": {"title": "Title"},
                "error_message": ""
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let page = client
            .crawl_page(&CrawlRequest::new("https://example.com"))
            .await
            .unwrap();

        assert_eq!(page.markdown, "# Title");
        assert_eq!(page.structure.header, "Site");
        assert_eq!(page.structure.footer, "Not found");
        assert_eq!(page.structure.ads, vec!["banner".to_string()]);
    }

    #[tokio::test]
    async fn test_collaborator_failure_uses_message_then_fallback() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(CRAWL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error_message": "Timeout while loading page"
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path(LLM_CONVERT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;

        let err = client
            .crawl_page(&CrawlRequest::new("https://example.com"))
            .await
            .unwrap_err();
        assert!(matches!(&err, ClientError::Collaborator(m) if m == "Timeout while loading page"));

        let request = ConvertRequest {
            folder_path: "/tmp/crawl".to_string(),
            instruction: "Summarise".to_string(),
            model: "gpt-5-mini".to_string(),
        };
        let err = client.llm_convert(&request).await.unwrap_err();
        assert!(matches!(&err, ClientError::Collaborator(m) if m == "Conversion failed."));
    }

    #[tokio::test]
    async fn test_http_error_status_is_retryable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(LLM_LIST_PATH))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let err = client.llm_list(30).await.unwrap_err();

        assert!(matches!(err, ClientError::HttpStatus(502)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let config = ClientConfig::new("http://127.0.0.1:9").with_connect_timeout(1);
        let client = CrawlClient::new(config).unwrap();

        let err = client.llm_list(30).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.user_message(), "Network error occurred. Please try again.");
    }

    #[tokio::test]
    async fn test_analyze_validates_before_calling() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;

        let err = client
            .analyze(&AnalyzeRequest::new("   ", "openai/gpt-5-mini"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let err = client
            .analyze(&AnalyzeRequest::new("some text", NO_MODEL))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_collect_links_streamed() {
        let mock_server = MockServer::start().await;
        let body = concat!(
            "data: {\"type\": \"log\", \"message\": \"Starting\"}\n\n",
            "data: {\"type\": \"done\", \"internal_links\": [{\"href\": \"https://a.com/x\", \"text\": \"X\", \"category\": \"Standard\"}], \"external_links\": [{\"href\": \"https://b.com\", \"text\": \"B\", \"category\": \"Standard\"}]}\n\n",
        );

        Mock::given(method("POST"))
            .and(path(COLLECT_LINKS_PATH))
            .and(body_json(json!({"url": "https://a.com", "depth": 1, "max_urls": 100})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let request = CollectLinksRequest {
            url: "https://a.com".to_string(),
            depth: 1,
            max_urls: 100,
        };

        let LinkFeed::Streamed(stream) = client.collect_links(&request).await.unwrap() else {
            panic!("expected a streamed response");
        };
        let events: Vec<_> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            StreamEvent::Done(links) => {
                assert_eq!(links.internal_links.len(), 1);
                assert_eq!(links.external_links.len(), 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_collect_links_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(COLLECT_LINKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "internal_links": [{"href": "https://a.com/x", "text": "X", "category": "Board/Forum"}],
                "external_links": []
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let request = CollectLinksRequest {
            url: "https://a.com".to_string(),
            depth: 0,
            max_urls: 500,
        };

        match client.collect_links(&request).await.unwrap() {
            LinkFeed::Complete(links) => assert_eq!(links.len(), 1),
            LinkFeed::Streamed(_) => panic!("expected a complete body"),
        }
    }

    #[tokio::test]
    async fn test_batch_crawl_rejects_empty_links() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        let err = client.batch_crawl(&[], "out").await.err().unwrap();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn test_batch_crawl_sends_url_for_missing_text() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(BATCH_CRAWL_PATH))
            .and(body_json(json!({
                "links": [
                    {"href": "https://a.com/", "text": "https://a.com/"},
                    {"href": "https://a.com/b", "text": "B"}
                ],
                "output_folder_name": "out"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"type\": \"log\", \"message\": \"started\"}\n\n",
                "text/event-stream",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let links = [
            BatchLink::new("https://a.com/", ""),
            BatchLink::new("https://a.com/b", "B"),
        ];
        let mut events = client.batch_crawl(&links, "out").await.unwrap();
        let first = events.next().await.unwrap().unwrap();
        assert_eq!(first, StreamEvent::Log { message: "started".into() });
    }

    #[tokio::test]
    async fn test_submit_rejection_is_submission_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(LLM_SUBMIT_PATH))
            .and(body_json(json!({"jsonl_folder_path": "/missing"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error_message": "Invalid directory path: /missing"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let err = client.llm_submit("/missing").await.unwrap_err();

        assert!(matches!(err, ClientError::Submission(m) if m.contains("/missing")));
    }

    #[tokio::test]
    async fn test_status_decodes_jobs_and_skips_empty_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(LLM_STATUS_PATH))
            .and(body_json(json!({"batch_ids": ["batch_1"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "batches": [{
                    "batch_id": "batch_1",
                    "status": "finalizing",
                    "completed": 4,
                    "failed": 0,
                    "total": 5,
                    "output_file_id": null,
                    "error_file_id": null
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;

        assert!(client.llm_status(&[]).await.unwrap().is_empty());

        let jobs = client.llm_status(&["batch_1".to_string()]).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, BatchStatus::InProgress);
        assert_eq!(jobs[0].completed, 4);
    }

    #[tokio::test]
    async fn test_results_without_ids_is_not_ready() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server).await;

        let err = client.llm_results(&[], "/tmp/out").await.unwrap_err();
        assert!(matches!(err, ClientError::NotReady(_)));
    }

    #[tokio::test]
    async fn test_results_reports_rejected_count() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(LLM_RESULTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "output_folder": "/tmp/crawl_results",
                "total_files": 12,
                "rejected_count": 2
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let download = client
            .llm_results(&["batch_1".to_string()], "/tmp/crawl_results")
            .await
            .unwrap();

        assert_eq!(download.total_files, 12);
        assert_eq!(download.rejected_count, 2);
    }
}
