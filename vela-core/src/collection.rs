//! Collection - lazy, restartable pagination over a listing operation
//!
//! A collection never materializes results up front. Each call to `pages()`
//! or `iter()` begins a fresh request sequence from the first page; nothing
//! is cached across iterations.

use std::collections::VecDeque;

use serde_json::{json, Value};
use tracing::debug;

use crate::codec::{decode_handle, extract_path, scalar_to_string};
use crate::error::Result;
use crate::resource::ResourceHandle;
use crate::schema::CollectionDef;
use crate::service::Service;

/// One decoded page of a listing response
#[derive(Debug, Clone)]
pub struct Page {
    /// Handles decoded from the page items, loaded with the attribute data
    /// the listing response already carries
    pub items: Vec<ResourceHandle>,
    /// The untransformed listing response
    pub raw: Value,
}

/// A pager-backed sequence of resource handles
#[derive(Debug, Clone)]
pub struct ResourceCollection {
    service: Service,
    def: CollectionDef,
    base_request: Value,
}

impl ResourceCollection {
    pub(crate) fn new(service: Service, def: CollectionDef, base_request: Value) -> Self {
        Self {
            service,
            def,
            base_request,
        }
    }

    /// Resource type this collection yields
    pub fn target_type(&self) -> &str {
        &self.def.type_name
    }

    /// Begin a fresh page sequence from the first page
    pub fn pages(&self) -> Pager {
        Pager {
            service: self.service.clone(),
            def: self.def.clone(),
            base_request: self.base_request.clone(),
            token: None,
            done: false,
        }
    }

    /// Begin a fresh item-at-a-time iteration from the first page
    pub fn iter(&self) -> HandleIter {
        HandleIter {
            pager: self.pages(),
            buffer: VecDeque::new(),
        }
    }

    /// Perform exactly one listing call and return its page
    pub async fn first_page(&self) -> Result<Page> {
        let mut pager = self.pages();
        // The first call always produces a page, even an empty one.
        Ok(pager.next_page().await?.unwrap_or(Page {
            items: Vec::new(),
            raw: Value::Null,
        }))
    }

    /// Drain every page into a single vector of handles
    pub async fn items(&self) -> Result<Vec<ResourceHandle>> {
        let mut pager = self.pages();
        let mut items = Vec::new();
        while let Some(page) = pager.next_page().await? {
            items.extend(page.items);
        }
        Ok(items)
    }
}

/// Drives the pagination token protocol
///
/// The request carries no token for page one; the response's token field
/// names the next page, and an absent or empty token terminates.
#[derive(Debug, Clone)]
pub struct Pager {
    service: Service,
    def: CollectionDef,
    base_request: Value,
    token: Option<String>,
    done: bool,
}

impl Pager {
    /// Fetch the next page, or `None` once the sequence is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let mut request = self.base_request.clone();
        if let (Some(token), Some(object)) = (&self.token, request.as_object_mut()) {
            object.insert(self.def.page.input_token.clone(), json!(token));
        }

        debug!(
            resource_type = %self.def.type_name,
            operation = %self.def.operation,
            "fetching collection page"
        );
        let raw = self
            .service
            .invoke(&self.def.type_name, &self.def.operation, request)
            .await?;

        let next = extract_path(&raw, &self.def.page.output_token)
            .and_then(scalar_to_string)
            .filter(|token| !token.is_empty());

        let items = match extract_path(&raw, &self.def.page.items) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| decode_handle(&self.service, &self.def.type_name, item))
                .collect::<Result<Vec<_>>>()?,
            Some(single) => vec![decode_handle(&self.service, &self.def.type_name, single)?],
            // An omitted items field is an empty page.
            None => Vec::new(),
        };

        self.done = next.is_none();
        self.token = next;
        Ok(Some(Page { items, raw }))
    }
}

/// Item-at-a-time iteration over a pager
#[derive(Debug, Clone)]
pub struct HandleIter {
    pager: Pager,
    buffer: VecDeque<ResourceHandle>,
}

impl HandleIter {
    /// Next handle, fetching further pages as needed
    pub async fn next(&mut self) -> Result<Option<ResourceHandle>> {
        loop {
            if let Some(handle) = self.buffer.pop_front() {
                return Ok(Some(handle));
            }
            match self.pager.next_page().await? {
                Some(page) => self.buffer.extend(page.items),
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, AdapterResult, ServiceAdapter};
    use crate::schema::ServiceSchema;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const DESCRIPTOR: &str = r#"{
        "service": "widgets",
        "resources": {
            "Widget": {
                "identifiers": [{ "name": "Id", "path": "WidgetId" }],
                "attributes": ["Color"]
            }
        },
        "collections": {
            "Widgets": {
                "type": "Widget",
                "operation": "ListWidgets",
                "page": {
                    "input_token": "NextToken",
                    "output_token": "NextToken",
                    "items": "Widgets"
                }
            }
        }
    }"#;

    // Replays the same scripted page sequence for every fresh iteration
    struct PagedAdapter {
        pages: Vec<Value>,
        cursor: Mutex<usize>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl PagedAdapter {
        fn new(pages: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                cursor: Mutex::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ServiceAdapter for PagedAdapter {
        async fn invoke(&self, operation: &str, request: Value) -> AdapterResult<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), request.clone()));
            let mut cursor = self.cursor.lock().unwrap();
            // Restarted iterations begin from the first page again.
            if request.get("NextToken").is_none() {
                *cursor = 0;
            }
            let page = self
                .pages
                .get(*cursor)
                .cloned()
                .ok_or_else(|| AdapterError::new("no page scripted"))?;
            *cursor += 1;
            Ok(page)
        }
    }

    fn widget(id: &str) -> Value {
        serde_json::json!({ "WidgetId": id, "Color": "blue" })
    }

    fn two_page_service() -> (Service, Arc<PagedAdapter>) {
        let adapter = PagedAdapter::new(vec![
            serde_json::json!({
                "Widgets": [widget("w-1"), widget("w-2"), widget("w-3")],
                "NextToken": "page-2"
            }),
            serde_json::json!({
                "Widgets": [widget("w-4"), widget("w-5")]
            }),
        ]);
        let schema = ServiceSchema::from_json(DESCRIPTOR).unwrap();
        (Service::new(schema, adapter.clone()), adapter)
    }

    #[tokio::test]
    async fn pager_terminates_on_absent_token() {
        let (service, adapter) = two_page_service();
        let collection = service.collection("Widgets").unwrap();

        let mut pager = collection.pages();
        let first = pager.next_page().await.unwrap().unwrap();
        assert_eq!(first.items.len(), 3);
        let second = pager.next_page().await.unwrap().unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(pager.next_page().await.unwrap().is_none());

        let calls = adapter.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1.get("NextToken").is_none());
        assert_eq!(calls[1].1["NextToken"], serde_json::json!("page-2"));
    }

    #[tokio::test]
    async fn iteration_yields_all_items_decoded() {
        let (service, _) = two_page_service();
        let collection = service.collection("Widgets").unwrap();

        let mut ids = Vec::new();
        let mut iter = collection.iter();
        while let Some(handle) = iter.next().await.unwrap() {
            assert!(handle.is_loaded());
            ids.push(handle.identifier("Id").unwrap().to_string());
        }
        assert_eq!(ids, vec!["w-1", "w-2", "w-3", "w-4", "w-5"]);
    }

    #[tokio::test]
    async fn restarted_iteration_begins_from_first_page() {
        let (service, adapter) = two_page_service();
        let collection = service.collection("Widgets").unwrap();

        let first_run: Vec<String> = collection
            .items()
            .await
            .unwrap()
            .iter()
            .map(|h| h.identifier("Id").unwrap().to_string())
            .collect();
        let second_run: Vec<String> = collection
            .items()
            .await
            .unwrap()
            .iter()
            .map(|h| h.identifier("Id").unwrap().to_string())
            .collect();

        assert_eq!(first_run, second_run);
        // Two full sweeps, two calls each.
        assert_eq!(adapter.calls().len(), 4);
        assert!(adapter.calls()[2].1.get("NextToken").is_none());
    }

    #[tokio::test]
    async fn first_page_issues_exactly_one_call() {
        let (service, adapter) = two_page_service();
        let collection = service.collection("Widgets").unwrap();

        let page = collection.first_page().await.unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.raw["NextToken"], serde_json::json!("page-2"));
        assert_eq!(adapter.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_token_terminates() {
        let adapter = PagedAdapter::new(vec![serde_json::json!({
            "Widgets": [widget("w-1")],
            "NextToken": ""
        })]);
        let schema = ServiceSchema::from_json(DESCRIPTOR).unwrap();
        let service = Service::new(schema, adapter.clone());

        let items = service.collection("Widgets").unwrap().items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(adapter.calls().len(), 1);
    }

    #[tokio::test]
    async fn omitted_items_field_is_an_empty_page() {
        let adapter = PagedAdapter::new(vec![serde_json::json!({})]);
        let schema = ServiceSchema::from_json(DESCRIPTOR).unwrap();
        let service = Service::new(schema, adapter);

        let page = service.collection("Widgets").unwrap().first_page().await.unwrap();
        assert!(page.items.is_empty());
    }
}
