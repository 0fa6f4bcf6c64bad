use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tessera_discovery::{ModelFilter, ModelSelector, ModelsFetcher, MAX_NUM_MODELS, PAGE_SIZE};
use tessera_graphql::{GraphqlError, GraphqlRequest, GraphqlTransport};

/// Serves pages of generated models; the cursor stops advancing after `pages`.
struct PagedModels {
    pages: usize,
    calls: AtomicUsize,
    requests: Mutex<Vec<GraphqlRequest>>,
}

impl PagedModels {
    fn new(pages: usize) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GraphqlTransport for PagedModels {
    async fn send(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let page = call.min(self.pages - 1);
        let edges: Vec<Value> = if call < self.pages {
            (0..PAGE_SIZE)
                .map(|i| json!({"node": {"name": format!("model_{}_{}", call, i), "uniqueId": null, "description": null}}))
                .collect()
        } else {
            Vec::new()
        };
        Ok(json!({"data": {"environment": {"applied": {"models": {
            "pageInfo": {"endCursor": format!("cursor-{}", page)},
            "edges": edges
        }}}}}))
    }
}

/// Answers lineage and details lookups with fixed nodes.
struct SingleModel {
    response: Value,
    requests: Mutex<Vec<GraphqlRequest>>,
}

#[async_trait]
impl GraphqlTransport for SingleModel {
    async fn send(&self, request: &GraphqlRequest) -> Result<Value, GraphqlError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn test_pagination_stops_when_cursor_repeats() {
    let api = Arc::new(PagedModels::new(2));
    let fetcher = ModelsFetcher::new(api.clone(), 11);

    let models = fetcher.fetch_models(ModelFilter::Marts).await.unwrap();

    assert_eq!(models.len(), 2 * PAGE_SIZE);
    // Two pages, then one request whose cursor equals the previous one.
    assert_eq!(api.calls.load(Ordering::SeqCst), 3);

    let requests = api.requests.lock().unwrap();
    assert_eq!(requests[0].variables["after"], "");
    assert_eq!(requests[1].variables["after"], "cursor-0");
    assert_eq!(requests[0].variables["modelsFilter"], json!({"modelingLayer": "marts"}));
    assert_eq!(requests[0].variables["first"], 100);
    assert_eq!(requests[0].variables["sort"]["field"], "queryUsageCount");
}

#[tokio::test]
async fn test_pagination_capped_at_max_models() {
    let api = Arc::new(PagedModels::new(usize::MAX));
    let fetcher = ModelsFetcher::new(api.clone(), 11);

    let models = fetcher.fetch_models(ModelFilter::All).await.unwrap();

    assert_eq!(models.len(), MAX_NUM_MODELS);
    assert_eq!(api.calls.load(Ordering::SeqCst), MAX_NUM_MODELS / PAGE_SIZE);
}

#[tokio::test]
async fn test_parents_by_unique_id() {
    let api = Arc::new(SingleModel {
        response: json!({"data": {"environment": {"applied": {"models": {"edges": [
            {"node": {"parents": [
                {"resourceType": "source", "name": "raw_orders", "description": null},
                {"resourceType": "macro", "name": "cents_to_dollars", "description": "Convert"}
            ]}}
        ]}}}}}),
        requests: Mutex::new(Vec::new()),
    });
    let fetcher = ModelsFetcher::new(api.clone(), 11);

    let selector = ModelSelector::new("orders", Some("model.shop.orders".to_string()));
    let parents = fetcher.fetch_model_parents(&selector).await.unwrap();

    assert_eq!(parents.len(), 2);
    assert_eq!(parents[0].resource_type.as_deref(), Some("source"));
    let requests = api.requests.lock().unwrap();
    assert_eq!(requests[0].variables["modelsFilter"], json!({"uniqueIds": ["model.shop.orders"]}));
    assert_eq!(requests[0].variables["first"], 1);
    assert!(requests[0].query.contains("GetModelParents"));
}

#[tokio::test]
async fn test_unknown_model_yields_empty_results() {
    let api = Arc::new(SingleModel {
        response: json!({"data": {"environment": {"applied": {"models": {"edges": []}}}}}),
        requests: Mutex::new(Vec::new()),
    });
    let fetcher = ModelsFetcher::new(api, 11);
    let selector = ModelSelector::Name("nope".to_string());

    assert!(fetcher.fetch_model_details(&selector).await.unwrap().is_none());
    assert!(fetcher.fetch_model_children(&selector).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_api_errors_propagate() {
    let api = Arc::new(SingleModel {
        response: json!({"errors": [{"message": "Invalid token"}]}),
        requests: Mutex::new(Vec::new()),
    });
    let fetcher = ModelsFetcher::new(api, 11);

    let err = fetcher.fetch_models(ModelFilter::All).await.unwrap_err();
    assert_eq!(err.to_string(), "Errors calling API: Invalid token");
}
