use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::ExportSettings;
use crate::entities::{
    display_name, folder_name, is_safe_id, item_id, ExportSummary, ResourceKind, ResourceStats,
};
use crate::error::Error;
use crate::ports::{ExportSink, MarketingApi};

const UNTITLED: &str = "untitled";

/// Largest `count` the API accepts for one members page.
const MAX_PAGE_SIZE: u32 = 1000;

/// Progress notifications emitted while exporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Started(ResourceKind),
    Finished(ResourceKind, ResourceStats),
}

/// Describes a list endpoint whose items each get their own folder.
struct Collection {
    kind: ResourceKind,
    endpoint: String,
    /// Field of the response holding the item array
    field: &'static str,
    /// JSON pointers tried in order for the folder display name
    name_pointers: &'static [&'static str],
    /// File name for the item's own metadata
    metadata_file: &'static str,
}

/// Folder prepared for one item of a collection.
struct ItemFolder {
    id: String,
    path: String,
}

/// Exports every resource type from the marketing API into an [`ExportSink`].
///
/// Each exporter fetches a list, writes one folder per item and then fetches
/// per-item details. A failed list fetch aborts the run; a failed detail fetch
/// is logged and skipped.
pub struct ExportUseCase<A, S>
where
    A: MarketingApi,
    S: ExportSink,
{
    api: Arc<A>,
    sink: Arc<S>,
    settings: ExportSettings,
}

impl<A, S> ExportUseCase<A, S>
where
    A: MarketingApi,
    S: ExportSink,
{
    pub fn new(api: Arc<A>, sink: Arc<S>, settings: ExportSettings) -> Self {
        Self {
            api,
            sink,
            settings,
        }
    }

    /// Run all exporters in their fixed order.
    pub async fn execute<F>(&self, progress: F) -> Result<ExportSummary, Error>
    where
        F: Fn(ExportEvent),
    {
        self.execute_kinds(&ResourceKind::ALL, progress).await
    }

    /// Run a subset of exporters. Order is always the fixed export order and
    /// duplicates are ignored. The first failure stops the run.
    pub async fn execute_kinds<F>(
        &self,
        kinds: &[ResourceKind],
        progress: F,
    ) -> Result<ExportSummary, Error>
    where
        F: Fn(ExportEvent),
    {
        let mut selected = kinds.to_vec();
        selected.sort();
        selected.dedup();

        let mut summary = ExportSummary::default();
        for kind in selected {
            progress(ExportEvent::Started(kind));
            let stats = self.export(kind).await?;
            progress(ExportEvent::Finished(kind, stats));
            summary.resources.push((kind, stats));
        }

        info!(
            items = summary.total_items(),
            skipped = summary.total_skipped(),
            "export complete"
        );
        Ok(summary)
    }

    /// Run a single exporter.
    #[instrument(skip(self))]
    pub async fn export(&self, kind: ResourceKind) -> Result<ResourceStats, Error> {
        info!("exporting {}", kind);
        self.sink.ensure_dir(kind.dir()).await?;

        match kind {
            ResourceKind::Campaigns => self.export_campaigns().await,
            ResourceKind::Templates => self.export_templates().await,
            ResourceKind::Automations => self.export_automations().await,
            ResourceKind::Audiences => self.export_audiences().await,
            ResourceKind::AudienceMembers => self.export_audience_members().await,
            ResourceKind::LandingPages => self.export_landing_pages().await,
            ResourceKind::FileManager => {
                let endpoint = format!("/file-manager/files?count={}", self.settings.list_count);
                self.export_single(kind, &endpoint, "files", "files.json")
                    .await
            }
            ResourceKind::Surveys => {
                self.export_single(kind, "/surveys", "surveys", "surveys.json")
                    .await
            }
            ResourceKind::Ecommerce => self.export_ecommerce().await,
        }
    }

    // =========================================================================
    // Exporters
    // =========================================================================

    async fn export_campaigns(&self) -> Result<ResourceStats, Error> {
        let collection = Collection {
            kind: ResourceKind::Campaigns,
            endpoint: self.list_endpoint("/campaigns"),
            field: "campaigns",
            name_pointers: &["/settings/title", "/settings/subject_line"],
            metadata_file: "campaign.json",
        };

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };
            stats.items += 1;

            if let Some(content) = self
                .fetch_detail(&format!("/campaigns/{}/content", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "content.json", &content).await?;
                self.write_text_field(&folder.path, "content.html", &content, "html")
                    .await?;
                self.write_text_field(&folder.path, "content.txt", &content, "plain_text")
                    .await?;
            }

            if let Some(report) = self
                .fetch_detail(&format!("/reports/{}", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "report.json", &report).await?;
            }

            if let Some(activity) = self
                .fetch_detail(&format!("/reports/{}/email-activity", folder.id), &mut stats)
                .await?
            {
                self.sink
                    .write_json(&folder.path, "email-activity.json", &activity)
                    .await?;
            }
        }

        Ok(stats)
    }

    async fn export_templates(&self) -> Result<ResourceStats, Error> {
        let collection = Collection {
            kind: ResourceKind::Templates,
            endpoint: self.list_endpoint("/templates"),
            field: "templates",
            name_pointers: &["/name"],
            metadata_file: "template.json",
        };

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };
            stats.items += 1;

            if let Some(template) = self
                .fetch_detail(&format!("/templates/{}", folder.id), &mut stats)
                .await?
            {
                self.write_text_field(&folder.path, "template.html", &template, "edit_source")
                    .await?;
            }
        }

        Ok(stats)
    }

    async fn export_automations(&self) -> Result<ResourceStats, Error> {
        let collection = Collection {
            kind: ResourceKind::Automations,
            endpoint: self.list_endpoint("/automations"),
            field: "automations",
            name_pointers: &["/settings/title"],
            metadata_file: "automation.json",
        };

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };
            stats.items += 1;

            if let Some(emails) = self
                .fetch_detail(&format!("/automations/{}/emails", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "emails.json", &emails).await?;
            }
        }

        Ok(stats)
    }

    async fn export_audiences(&self) -> Result<ResourceStats, Error> {
        let collection = self.lists_collection(ResourceKind::Audiences);

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };
            stats.items += 1;

            if let Some(segments) = self
                .fetch_detail(&format!("/lists/{}/segments", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "segments.json", &segments).await?;
            }

            if let Some(tags) = self
                .fetch_detail(&format!("/lists/{}/tag-search", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "tags.json", &tags).await?;
            }
        }

        Ok(stats)
    }

    async fn export_audience_members(&self) -> Result<ResourceStats, Error> {
        let collection = self.lists_collection(ResourceKind::AudienceMembers);

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };

            let (members, total_items) = match self.fetch_members(&folder.id).await {
                Ok(result) => result,
                Err(e) if e.is_request_failure() => {
                    warn!(list_id = %folder.id, error = %e, "failed to fetch audience members");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            info!(list_id = %folder.id, count = members.len(), "fetched audience members");

            let document = json!({
                "list_id": folder.id,
                "total_items": total_items.unwrap_or(members.len() as u64),
                "members": members,
            });
            self.sink.write_json(&folder.path, "members.json", &document).await?;
            stats.items += 1;
        }

        Ok(stats)
    }

    async fn export_landing_pages(&self) -> Result<ResourceStats, Error> {
        let collection = Collection {
            kind: ResourceKind::LandingPages,
            endpoint: self.list_endpoint("/landing-pages"),
            field: "landing_pages",
            name_pointers: &["/name", "/title"],
            metadata_file: "page.json",
        };

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };
            stats.items += 1;

            if let Some(content) = self
                .fetch_detail(&format!("/landing-pages/{}/content", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "content.json", &content).await?;
                self.write_text_field(&folder.path, "content.html", &content, "html")
                    .await?;
            }
        }

        Ok(stats)
    }

    async fn export_ecommerce(&self) -> Result<ResourceStats, Error> {
        let collection = Collection {
            kind: ResourceKind::Ecommerce,
            endpoint: format!("/ecommerce/stores?count={}", self.settings.store_count),
            field: "stores",
            name_pointers: &["/name"],
            metadata_file: "store.json",
        };

        let mut stats = ResourceStats::default();
        for item in self.fetch_collection(&collection.endpoint, collection.field).await? {
            let Some(folder) = self.prepare_item(&collection, &item).await? else {
                continue;
            };
            stats.items += 1;

            if let Some(orders) = self
                .fetch_detail(&format!("/ecommerce/stores/{}/orders", folder.id), &mut stats)
                .await?
            {
                self.sink.write_json(&folder.path, "orders.json", &orders).await?;
            }
        }

        Ok(stats)
    }

    /// Resources stored as one file holding the whole list response.
    async fn export_single(
        &self,
        kind: ResourceKind,
        endpoint: &str,
        field: &str,
        file_name: &str,
    ) -> Result<ResourceStats, Error> {
        let response = self.api.get(endpoint).await?;
        let count = response
            .get(field)
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        self.sink.write_json(kind.dir(), file_name, &response).await?;
        info!(count, "saved {}/{}", kind.dir(), file_name);

        Ok(ResourceStats {
            items: count,
            skipped: 0,
        })
    }

    // =========================================================================
    // Private helpers
    // =========================================================================

    fn list_endpoint(&self, path: &str) -> String {
        format!("{}?count={}", path, self.settings.list_count)
    }

    fn lists_collection(&self, kind: ResourceKind) -> Collection {
        Collection {
            kind,
            endpoint: self.list_endpoint("/lists"),
            field: "lists",
            name_pointers: &["/name"],
            metadata_file: "list.json",
        }
    }

    /// Fetch a list endpoint and take the item array out of it.
    ///
    /// A response without the field counts as an empty collection.
    async fn fetch_collection(&self, endpoint: &str, field: &str) -> Result<Vec<Value>, Error> {
        let response = self.api.get(endpoint).await?;
        let items = take_array(response, field);
        info!(count = items.len(), "found {} {}", items.len(), field);
        Ok(items)
    }

    /// Create the item's folder and write its metadata.
    ///
    /// Returns `None` for items without an id or with an id that is not safe
    /// in a path; they are skipped.
    async fn prepare_item(
        &self,
        collection: &Collection,
        item: &Value,
    ) -> Result<Option<ItemFolder>, Error> {
        let Some(id) = item_id(item) else {
            warn!(kind = %collection.kind, "skipping item without id");
            return Ok(None);
        };
        if !is_safe_id(&id) {
            warn!(kind = %collection.kind, %id, "skipping item with unsafe id");
            return Ok(None);
        }
        let name = display_name(item, collection.name_pointers).unwrap_or(UNTITLED);
        debug!(%id, name, "processing item");

        let path = format!("{}/{}", collection.kind.dir(), folder_name(name, &id));
        self.sink.ensure_dir(&path).await?;

        // Audience members share the audiences folder; list.json is written there already.
        if collection.kind != ResourceKind::AudienceMembers {
            self.sink
                .write_json(&path, collection.metadata_file, item)
                .await?;
        }

        Ok(Some(ItemFolder { id, path }))
    }

    /// Fetch a per-item detail. Request failures are logged, counted and
    /// turned into `None`; other errors propagate.
    async fn fetch_detail(
        &self,
        endpoint: &str,
        stats: &mut ResourceStats,
    ) -> Result<Option<Value>, Error> {
        match self.api.get(endpoint).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_request_failure() => {
                warn!(endpoint, error = %e, "skipping detail");
                stats.skipped += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write a string field of `value` verbatim, if it is present and non-empty.
    async fn write_text_field(
        &self,
        dir: &str,
        name: &str,
        value: &Value,
        field: &str,
    ) -> Result<(), Error> {
        match value.get(field).and_then(Value::as_str) {
            Some(text) if !text.is_empty() => self.sink.write_text(dir, name, text).await,
            _ => Ok(()),
        }
    }

    /// Page through a list's members until a short page comes back.
    async fn fetch_members(&self, list_id: &str) -> Result<(Vec<Value>, Option<u64>), Error> {
        // Larger counts are capped by the API and would end paging early
        let page_size = self.settings.page_size.clamp(1, MAX_PAGE_SIZE);
        let mut offset: u64 = 0;
        let mut members = Vec::new();
        let mut total_items = None;

        loop {
            let endpoint = format!(
                "/lists/{}/members?offset={}&count={}",
                list_id, offset, page_size
            );
            let page = self.api.get(&endpoint).await?;
            total_items = page
                .get("total_items")
                .and_then(Value::as_u64)
                .or(total_items);

            let batch = take_array(page, "members");
            let received = batch.len();
            members.extend(batch);
            debug!(list_id, offset, received, "fetched members page");

            if received < page_size as usize {
                break;
            }
            offset += u64::from(page_size);
        }

        Ok((members, total_items))
    }
}

fn take_array(mut value: Value, field: &str) -> Vec<Value> {
    match value.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;

    // =========================================================================
    // Mock ports
    // =========================================================================

    /// API answering from a fixed table of endpoint -> response.
    /// Unknown endpoints answer 404.
    #[derive(Default)]
    struct MockApi {
        responses: HashMap<String, Result<Value, u16>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockApi {
        fn with(mut self, endpoint: &str, body: Value) -> Self {
            self.responses.insert(endpoint.to_string(), Ok(body));
            self
        }

        fn failing(mut self, endpoint: &str, status: u16) -> Self {
            self.responses.insert(endpoint.to_string(), Err(status));
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MarketingApi for MockApi {
        async fn get(&self, endpoint: &str) -> Result<Value, Error> {
            self.requests.lock().unwrap().push(endpoint.to_string());
            match self.responses.get(endpoint) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(Error::api(*status, "mock failure")),
                None => Err(Error::api(404, "Resource Not Found")),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        dirs: Mutex<BTreeSet<String>>,
        files: Mutex<BTreeMap<String, String>>,
    }

    impl MemorySink {
        fn has_dir(&self, dir: &str) -> bool {
            self.dirs.lock().unwrap().contains(dir)
        }

        fn file(&self, path: &str) -> Option<String> {
            self.files.lock().unwrap().get(path).cloned()
        }

        fn json(&self, path: &str) -> Value {
            let raw = self.file(path).unwrap_or_else(|| panic!("missing file {path}"));
            serde_json::from_str(&raw).unwrap()
        }

        fn paths(&self) -> Vec<String> {
            self.files.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl ExportSink for MemorySink {
        async fn ensure_dir(&self, dir: &str) -> Result<(), Error> {
            self.dirs.lock().unwrap().insert(dir.to_string());
            Ok(())
        }

        async fn write_json(&self, dir: &str, name: &str, value: &Value) -> Result<(), Error> {
            let body = serde_json::to_string_pretty(value)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            self.write_text(dir, name, &body).await
        }

        async fn write_text(&self, dir: &str, name: &str, content: &str) -> Result<(), Error> {
            if !self.has_dir(dir) {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("directory {dir} was never created"),
                )));
            }
            self.files
                .lock()
                .unwrap()
                .insert(format!("{dir}/{name}"), content.to_string());
            Ok(())
        }
    }

    /// Sink whose writes always fail, to check that output errors are fatal.
    struct BrokenSink;

    #[async_trait]
    impl ExportSink for BrokenSink {
        async fn ensure_dir(&self, _dir: &str) -> Result<(), Error> {
            Ok(())
        }

        async fn write_json(&self, _dir: &str, _name: &str, _value: &Value) -> Result<(), Error> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }

        async fn write_text(&self, _dir: &str, _name: &str, _content: &str) -> Result<(), Error> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    fn build(api: MockApi) -> (ExportUseCase<MockApi, MemorySink>, Arc<MockApi>, Arc<MemorySink>) {
        let api = Arc::new(api);
        let sink = Arc::new(MemorySink::default());
        let use_case = ExportUseCase::new(api.clone(), sink.clone(), ExportSettings::default());
        (use_case, api, sink)
    }

    fn members_page(start: usize, len: usize, total: usize) -> Value {
        let members: Vec<Value> = (start..start + len)
            .map(|i| json!({"id": format!("m{i}"), "email_address": format!("user{i}@example.com")}))
            .collect();
        json!({"members": members, "total_items": total})
    }

    // =========================================================================
    // Exporters
    // =========================================================================

    #[tokio::test]
    async fn test_campaigns_write_metadata_and_details() {
        let api = MockApi::default()
            .with(
                "/campaigns?count=1000",
                json!({"campaigns": [
                    {"id": "c1", "settings": {"title": "Spring Sale!", "subject_line": "Hi"}}
                ]}),
            )
            .with(
                "/campaigns/c1/content",
                json!({"html": "<p>Hello</p>", "plain_text": "Hello"}),
            )
            .with("/reports/c1", json!({"opens": {"opens_total": 12}}))
            .with("/reports/c1/email-activity", json!({"emails": []}));
        let (use_case, _, sink) = build(api);

        let stats = use_case.export(ResourceKind::Campaigns).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 1, skipped: 0 });
        let folder = "campaigns/Spring Sale_-c1";
        assert_eq!(sink.json(&format!("{folder}/campaign.json"))["id"], "c1");
        assert_eq!(
            sink.file(&format!("{folder}/content.html")).as_deref(),
            Some("<p>Hello</p>")
        );
        assert_eq!(sink.file(&format!("{folder}/content.txt")).as_deref(), Some("Hello"));
        assert_eq!(
            sink.json(&format!("{folder}/report.json"))["opens"]["opens_total"],
            12
        );
        assert!(sink.file(&format!("{folder}/email-activity.json")).is_some());
    }

    #[tokio::test]
    async fn test_campaign_name_falls_back_to_subject_then_untitled() {
        let api = MockApi::default().with(
            "/campaigns?count=1000",
            json!({"campaigns": [
                {"id": "c1", "settings": {"subject_line": "Weekly digest"}},
                {"id": "c2", "settings": {}}
            ]}),
        );
        let (use_case, _, sink) = build(api);

        use_case.export(ResourceKind::Campaigns).await.unwrap();

        assert!(sink.has_dir("campaigns/Weekly digest-c1"));
        assert!(sink.has_dir("campaigns/untitled-c2"));
    }

    #[tokio::test]
    async fn test_detail_failure_does_not_stop_later_items() {
        let api = MockApi::default()
            .with(
                "/templates?count=1000",
                json!({"templates": [
                    {"id": 1, "name": "Broken"},
                    {"id": 2, "name": "Working"}
                ]}),
            )
            .failing("/templates/1", 404)
            .with("/templates/2", json!({"edit_source": "<html>ok</html>"}));
        let (use_case, api, sink) = build(api);

        let stats = use_case.export(ResourceKind::Templates).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 2, skipped: 1 });
        assert!(sink.file("templates/Broken-1/template.json").is_some());
        assert!(sink.file("templates/Broken-1/template.html").is_none());
        assert_eq!(
            sink.file("templates/Working-2/template.html").as_deref(),
            Some("<html>ok</html>")
        );
        assert_eq!(
            api.requests(),
            vec!["/templates?count=1000", "/templates/1", "/templates/2"]
        );
    }

    #[tokio::test]
    async fn test_template_without_edit_source_writes_no_html() {
        let api = MockApi::default()
            .with("/templates?count=1000", json!({"templates": [{"id": 7, "name": "Plain"}]}))
            .with("/templates/7", json!({"id": 7}));
        let (use_case, _, sink) = build(api);

        let stats = use_case.export(ResourceKind::Templates).await.unwrap();

        assert_eq!(stats.skipped, 0);
        assert!(sink.file("templates/Plain-7/template.html").is_none());
    }

    #[tokio::test]
    async fn test_automations_write_emails() {
        let api = MockApi::default()
            .with(
                "/automations?count=1000",
                json!({"automations": [{"id": "a1", "settings": {"title": "Welcome series"}}]}),
            )
            .with("/automations/a1/emails", json!({"emails": [{"id": "e1"}]}));
        let (use_case, _, sink) = build(api);

        use_case.export(ResourceKind::Automations).await.unwrap();

        let folder = "automations/Welcome series-a1";
        assert!(sink.file(&format!("{folder}/automation.json")).is_some());
        assert_eq!(sink.json(&format!("{folder}/emails.json"))["emails"][0]["id"], "e1");
    }

    #[tokio::test]
    async fn test_audiences_write_segments_and_tags() {
        let api = MockApi::default()
            .with("/lists?count=1000", json!({"lists": [{"id": "l1", "name": "Customers"}]}))
            .with("/lists/l1/segments", json!({"segments": []}))
            .failing("/lists/l1/tag-search", 500);
        let (use_case, _, sink) = build(api);

        let stats = use_case.export(ResourceKind::Audiences).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 1, skipped: 1 });
        assert!(sink.file("audiences/Customers-l1/list.json").is_some());
        assert!(sink.file("audiences/Customers-l1/segments.json").is_some());
        assert!(sink.file("audiences/Customers-l1/tags.json").is_none());
    }

    #[tokio::test]
    async fn test_members_pagination_accumulates_pages() {
        let api = MockApi::default()
            .with("/lists?count=1000", json!({"lists": [{"id": "l1", "name": "Newsletter"}]}))
            .with("/lists/l1/members?offset=0&count=1000", members_page(0, 1000, 2400))
            .with("/lists/l1/members?offset=1000&count=1000", members_page(1000, 1000, 2400))
            .with("/lists/l1/members?offset=2000&count=1000", members_page(2000, 400, 2400));
        let (use_case, api, sink) = build(api);

        let stats = use_case.export(ResourceKind::AudienceMembers).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 1, skipped: 0 });

        let member_requests: Vec<_> = api
            .requests()
            .into_iter()
            .filter(|r| r.contains("/members"))
            .collect();
        assert_eq!(
            member_requests,
            vec![
                "/lists/l1/members?offset=0&count=1000",
                "/lists/l1/members?offset=1000&count=1000",
                "/lists/l1/members?offset=2000&count=1000",
            ]
        );

        let written = sink.json("audiences/Newsletter-l1/members.json");
        let members = written["members"].as_array().unwrap();
        assert_eq!(members.len(), 2400);
        assert_eq!(members[0]["id"], "m0");
        assert_eq!(members[2399]["id"], "m2399");
        assert_eq!(written["total_items"], 2400);
        assert_eq!(written["list_id"], "l1");
        // Member export does not rewrite the audience metadata
        assert!(sink.file("audiences/Newsletter-l1/list.json").is_none());
    }

    #[tokio::test]
    async fn test_members_exact_page_boundary_requests_empty_page() {
        let api = MockApi::default()
            .with("/lists?count=1000", json!({"lists": [{"id": "l1", "name": "Small"}]}))
            .with("/lists/l1/members?offset=0&count=1000", members_page(0, 1000, 1000))
            .with("/lists/l1/members?offset=1000&count=1000", json!({"members": []}));
        let (use_case, api, sink) = build(api);

        use_case.export(ResourceKind::AudienceMembers).await.unwrap();

        assert_eq!(api.requests().len(), 3);
        let written = sink.json("audiences/Small-l1/members.json");
        assert_eq!(written["members"].as_array().unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_members_page_size_is_capped_at_api_maximum() {
        let api = Arc::new(
            MockApi::default()
                .with("/lists?count=1000", json!({"lists": [{"id": "l1", "name": "Big"}]}))
                .with("/lists/l1/members?offset=0&count=1000", members_page(0, 1000, 2400))
                .with("/lists/l1/members?offset=1000&count=1000", members_page(1000, 1000, 2400))
                .with("/lists/l1/members?offset=2000&count=1000", members_page(2000, 400, 2400)),
        );
        let sink = Arc::new(MemorySink::default());
        let settings = ExportSettings {
            page_size: 2000,
            ..ExportSettings::default()
        };
        let use_case = ExportUseCase::new(api.clone(), sink.clone(), settings);

        let stats = use_case.export(ResourceKind::AudienceMembers).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 1, skipped: 0 });
        assert!(!api.requests().iter().any(|r| r.contains("count=2000")));
        let written = sink.json("audiences/Big-l1/members.json");
        assert_eq!(written["members"].as_array().unwrap().len(), 2400);
    }

    #[tokio::test]
    async fn test_members_page_failure_skips_list_without_partial_file() {
        let api = MockApi::default()
            .with(
                "/lists?count=1000",
                json!({"lists": [{"id": "l1", "name": "A"}, {"id": "l2", "name": "B"}]}),
            )
            .with("/lists/l1/members?offset=0&count=1000", members_page(0, 1000, 1500))
            .failing("/lists/l1/members?offset=1000&count=1000", 500)
            .with("/lists/l2/members?offset=0&count=1000", members_page(0, 3, 3));
        let (use_case, _, sink) = build(api);

        let stats = use_case.export(ResourceKind::AudienceMembers).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 1, skipped: 1 });
        assert!(sink.file("audiences/A-l1/members.json").is_none());
        assert_eq!(
            sink.json("audiences/B-l2/members.json")["members"]
                .as_array()
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_landing_pages_write_content() {
        let api = MockApi::default()
            .with(
                "/landing-pages?count=1000",
                json!({"landing_pages": [{"id": "p1", "name": "Signup"}]}),
            )
            .with("/landing-pages/p1/content", json!({"html": "<h1>Join</h1>"}));
        let (use_case, _, sink) = build(api);

        use_case.export(ResourceKind::LandingPages).await.unwrap();

        assert!(sink.file("landing-pages/Signup-p1/page.json").is_some());
        assert_eq!(
            sink.file("landing-pages/Signup-p1/content.html").as_deref(),
            Some("<h1>Join</h1>")
        );
    }

    #[tokio::test]
    async fn test_single_file_resources() {
        let api = MockApi::default()
            .with(
                "/file-manager/files?count=1000",
                json!({"files": [{"id": 1}, {"id": 2}], "total_items": 2}),
            )
            .with("/surveys", json!({"surveys": [{"id": "s1"}]}));
        let (use_case, _, sink) = build(api);

        let files = use_case.export(ResourceKind::FileManager).await.unwrap();
        let surveys = use_case.export(ResourceKind::Surveys).await.unwrap();

        assert_eq!(files.items, 2);
        assert_eq!(surveys.items, 1);
        assert_eq!(sink.json("assets/files.json")["total_items"], 2);
        assert_eq!(sink.json("surveys/surveys.json")["surveys"][0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_ecommerce_writes_store_and_orders() {
        let api = MockApi::default()
            .with(
                "/ecommerce/stores?count=100",
                json!({"stores": [{"id": "store_1", "name": "Shop"}]}),
            )
            .with("/ecommerce/stores/store_1/orders", json!({"orders": [{"id": "o1"}]}));
        let (use_case, _, sink) = build(api);

        use_case.export(ResourceKind::Ecommerce).await.unwrap();

        assert!(sink.has_dir("ecommerce/stores/Shop-store_1"));
        assert!(sink.file("ecommerce/stores/Shop-store_1/store.json").is_some());
        assert_eq!(
            sink.json("ecommerce/stores/Shop-store_1/orders.json")["orders"][0]["id"],
            "o1"
        );
    }

    #[tokio::test]
    async fn test_missing_collection_field_is_empty() {
        let api = MockApi::default().with("/automations?count=1000", json!({"total_items": 0}));
        let (use_case, _, sink) = build(api);

        let stats = use_case.export(ResourceKind::Automations).await.unwrap();

        assert_eq!(stats, ResourceStats::default());
        assert!(sink.has_dir("automations"));
        assert!(sink.paths().is_empty());
    }

    #[tokio::test]
    async fn test_item_without_id_is_skipped() {
        let api = MockApi::default().with(
            "/ecommerce/stores?count=100",
            json!({"stores": [{"name": "Ghost"}]}),
        );
        let (use_case, api, _) = build(api);

        let stats = use_case.export(ResourceKind::Ecommerce).await.unwrap();

        assert_eq!(stats.items, 0);
        assert_eq!(api.requests(), vec!["/ecommerce/stores?count=100"]);
    }

    #[tokio::test]
    async fn test_item_with_path_like_id_is_skipped() {
        let api = MockApi::default()
            .with(
                "/ecommerce/stores?count=100",
                json!({"stores": [
                    {"id": "x/../../evil", "name": "Shop"},
                    {"id": "..", "name": "Dots"},
                    {"id": "store_2", "name": "Kept"}
                ]}),
            )
            .with("/ecommerce/stores/store_2/orders", json!({"orders": []}));
        let (use_case, api, sink) = build(api);

        let stats = use_case.export(ResourceKind::Ecommerce).await.unwrap();

        assert_eq!(stats, ResourceStats { items: 1, skipped: 0 });
        assert_eq!(
            api.requests(),
            vec!["/ecommerce/stores?count=100", "/ecommerce/stores/store_2/orders"]
        );
        assert!(sink
            .paths()
            .iter()
            .all(|p| p.starts_with("ecommerce/stores/Kept-store_2/")));
    }

    #[tokio::test]
    async fn test_list_counts_follow_settings() {
        let api = Arc::new(
            MockApi::default()
                .with("/campaigns?count=50", json!({"campaigns": []}))
                .with("/ecommerce/stores?count=5", json!({"stores": []})),
        );
        let sink = Arc::new(MemorySink::default());
        let settings = ExportSettings {
            list_count: 50,
            store_count: 5,
            ..ExportSettings::default()
        };
        let use_case = ExportUseCase::new(api.clone(), sink, settings);

        use_case
            .execute_kinds(&[ResourceKind::Campaigns, ResourceKind::Ecommerce], |_| {})
            .await
            .unwrap();

        assert_eq!(
            api.requests(),
            vec!["/campaigns?count=50", "/ecommerce/stores?count=5"]
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let api = Arc::new(
            MockApi::default()
                .with("/templates?count=1000", json!({"templates": [{"id": 1, "name": "T"}]})),
        );
        let use_case = ExportUseCase::new(api, Arc::new(BrokenSink), ExportSettings::default());

        let err = use_case.export(ResourceKind::Templates).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
    }

    // =========================================================================
    // Orchestrator
    // =========================================================================

    fn full_api() -> MockApi {
        MockApi::default()
            .with("/campaigns?count=1000", json!({"campaigns": []}))
            .with("/templates?count=1000", json!({"templates": []}))
            .with("/automations?count=1000", json!({"automations": []}))
            .with("/lists?count=1000", json!({"lists": []}))
            .with("/landing-pages?count=1000", json!({"landing_pages": []}))
            .with("/file-manager/files?count=1000", json!({"files": []}))
            .with("/surveys", json!({"surveys": []}))
            .with("/ecommerce/stores?count=100", json!({"stores": []}))
    }

    #[tokio::test]
    async fn test_execute_runs_all_kinds_in_order() {
        let (use_case, api, _) = build(full_api());
        let events = Mutex::new(Vec::new());

        let summary = use_case
            .execute(|event| events.lock().unwrap().push(event))
            .await
            .unwrap();

        let kinds: Vec<_> = summary.resources.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, ResourceKind::ALL.to_vec());
        assert_eq!(
            api.requests(),
            vec![
                "/campaigns?count=1000",
                "/templates?count=1000",
                "/automations?count=1000",
                "/lists?count=1000",
                "/lists?count=1000",
                "/landing-pages?count=1000",
                "/file-manager/files?count=1000",
                "/surveys",
                "/ecommerce/stores?count=100",
            ]
        );

        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 18);
        assert_eq!(events[0], ExportEvent::Started(ResourceKind::Campaigns));
        assert_eq!(
            events[17],
            ExportEvent::Finished(ResourceKind::Ecommerce, ResourceStats::default())
        );
    }

    #[tokio::test]
    async fn test_execute_kinds_sorts_and_dedups() {
        let (use_case, api, _) = build(full_api());

        let summary = use_case
            .execute_kinds(
                &[ResourceKind::Surveys, ResourceKind::Campaigns, ResourceKind::Surveys],
                |_| {},
            )
            .await
            .unwrap();

        let kinds: Vec<_> = summary.resources.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![ResourceKind::Campaigns, ResourceKind::Surveys]);
        assert_eq!(api.requests(), vec!["/campaigns?count=1000", "/surveys"]);
    }

    #[tokio::test]
    async fn test_list_failure_aborts_run() {
        let api = full_api()
            .with(
                "/campaigns?count=1000",
                json!({"campaigns": [{"id": "c1", "settings": {"title": "First"}}]}),
            )
            .failing("/templates?count=1000", 500);
        let (use_case, api, sink) = build(api);

        let err = use_case.execute(|_| {}).await.unwrap_err();

        assert!(matches!(err, Error::Api { status: 500, .. }));
        // Work done before the failure stays
        assert!(sink.has_dir("campaigns/First-c1"));
        assert!(sink.file("campaigns/First-c1/campaign.json").is_some());
        // Nothing after it ran
        assert!(sink.has_dir("templates"));
        assert!(!sink.has_dir("automations"));
        assert!(!sink.has_dir("audiences"));
        assert!(!api.requests().iter().any(|r| r.starts_with("/automations")));
    }
}
