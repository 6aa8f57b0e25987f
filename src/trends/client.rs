// HTTP client for the Google Trends web API.
//
// Comparison data is a two-step protocol: an `explore` call describes the
// comparison and returns one widget per payload kind, each carrying a
// request object and a short-lived token; the widget-data endpoints then
// return the actual series. Every JSON body is prefixed with an anti-XSSI
// guard (`)]}'`) that has to be stripped before parsing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::FetchError;
use super::models::{
    QueryParams, RealtimeTrend, RelatedQuery, RelatedTopic, Table, TrendingTerm, DATE_INDEX,
    REGION_INDEX,
};
use super::source::{RawRelated, RawRelatedMap, TrendsSource};
use crate::config::Config;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Upstream label on rising queries whose growth is too large to express.
const BREAKOUT_LABEL: &str = "Breakout";

/// Unauthenticated client for the trends explore and widget-data endpoints.
pub struct GoogleTrendsClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
    tz_offset: i32,
}

impl GoogleTrendsClient {
    pub fn new(base_url: &str, language: &str, tz_offset: i32) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            tz_offset,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(&config.api_url, &config.language, config.tz_offset)
    }

    /// GET an API path and parse the guarded JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/trends/api/{}", self.base_url, path);
        let tz = self.tz_offset.to_string();

        debug!(path = path, "Trends GET request");

        let response = self
            .client
            .get(&url)
            .query(&[("hl", self.language.as_str()), ("tz", tz.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        parse_guarded(&body)
    }

    /// Describe a comparison and collect the widgets the upstream offers for it.
    async fn explore(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<Vec<Widget>, FetchError> {
        let request = ExploreRequest {
            comparison_item: keywords
                .iter()
                .map(|keyword| ComparisonItem {
                    keyword: keyword.clone(),
                    time: params.timeframe.clone(),
                    geo: params.geo.clone(),
                })
                .collect(),
            category: params.category,
            property: String::new(),
        };

        let response: ExploreResponse = self
            .get_json("explore", &[("req", serde_json::to_string(&request)?)])
            .await?;
        Ok(response.widgets)
    }

    async fn widget_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        widget: &Widget,
        request: &Value,
    ) -> Result<T, FetchError> {
        self.get_json(
            &format!("widgetdata/{endpoint}"),
            &[
                ("req", serde_json::to_string(request)?),
                ("token", widget.token.clone()),
            ],
        )
        .await
    }

    /// Fetch the ranked lists behind every related-searches widget with the
    /// given id prefix, keyed by the keyword each widget is restricted to.
    ///
    /// Issues one explore request plus one widget-data request per keyword,
    /// all under the single pacing slot of the enclosing trait call.
    async fn related<T>(
        &self,
        keywords: &[String],
        params: &QueryParams,
        widget_prefix: &str,
        convert: fn(RankedKeyword) -> T,
    ) -> Result<RawRelatedMap<T>, FetchError> {
        let widgets = self.explore(keywords, params).await?;
        let mut result: RawRelatedMap<T> = BTreeMap::new();

        for widget in widgets.iter().filter(|w| w.id.starts_with(widget_prefix)) {
            let Some(keyword) = restricted_keyword(&widget.request) else {
                continue;
            };

            let data: RelatedResponse = self
                .widget_data("relatedsearches", widget, &widget.request)
                .await?;

            let mut lists = data.default.ranked_list.into_iter();
            let top = lists.next().map(|l| l.ranked_keyword);
            let rising = lists.next().map(|l| l.ranked_keyword);

            let lists = if top.is_none() && rising.is_none() {
                None
            } else {
                Some(RawRelated {
                    top: top.map(|v| v.into_iter().map(convert).collect()),
                    rising: rising.map(|v| v.into_iter().map(convert).collect()),
                })
            };
            result.insert(keyword, lists);
        }

        Ok(result)
    }
}

#[async_trait]
impl TrendsSource for GoogleTrendsClient {
    async fn interest_over_time(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<Table, FetchError> {
        let widgets = self.explore(keywords, params).await?;
        let widget = find_widget(&widgets, "TIMESERIES")?;

        let data: MultilineResponse = self
            .widget_data("multiline", widget, &widget.request)
            .await?;

        let mut table = Table::new(DATE_INDEX);
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); keywords.len()];
        for point in &data.default.timeline_data {
            table.index.push(format_timestamp(&point.time));
            table.partial.push(point.is_partial);
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(point.value.get(i).copied().unwrap_or(0.0));
            }
        }
        if table.partial.iter().all(|p| !p) {
            table.partial.clear();
        }
        for (keyword, column) in keywords.iter().zip(columns) {
            table.columns.insert(keyword.clone(), column);
        }

        Ok(table)
    }

    async fn related_queries(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<RawRelatedMap<RelatedQuery>, FetchError> {
        self.related(keywords, params, "RELATED_QUERIES", to_related_query)
            .await
    }

    async fn related_topics(
        &self,
        keywords: &[String],
        params: &QueryParams,
    ) -> Result<RawRelatedMap<RelatedTopic>, FetchError> {
        self.related(keywords, params, "RELATED_TOPICS", to_related_topic)
            .await
    }

    async fn interest_by_region(
        &self,
        keywords: &[String],
        params: &QueryParams,
        resolution: &str,
    ) -> Result<Table, FetchError> {
        let widgets = self.explore(keywords, params).await?;
        let widget = find_widget(&widgets, "GEO_MAP")?;

        let mut request = widget.request.clone();
        if let Some(obj) = request.as_object_mut() {
            obj.insert("resolution".into(), Value::String(resolution.to_string()));
            obj.insert("includeLowSearchVolumeGeos".into(), Value::Bool(true));
        }

        let data: ComparedGeoResponse = self.widget_data("comparedgeo", widget, &request).await?;

        let mut table = Table::new(REGION_INDEX);
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); keywords.len()];
        for region in &data.default.geo_map_data {
            table.index.push(region.geo_name.clone());
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(region.value.get(i).copied().unwrap_or(0.0));
            }
        }
        for (keyword, column) in keywords.iter().zip(columns) {
            table.columns.insert(keyword.clone(), column);
        }

        Ok(table)
    }

    async fn trending_searches(&self, geo: &str) -> Result<Vec<TrendingTerm>, FetchError> {
        let data: DailyTrendsResponse = self
            .get_json(
                "dailytrends",
                &[("geo", geo.to_string()), ("ns", "15".to_string())],
            )
            .await?;

        Ok(data
            .default
            .trending_searches_days
            .into_iter()
            .flat_map(|day| day.trending_searches)
            .map(|s| TrendingTerm {
                query: s.title.query,
                traffic: s.formatted_traffic,
            })
            .collect())
    }

    async fn realtime_trends(
        &self,
        geo: &str,
        category: &str,
    ) -> Result<Vec<RealtimeTrend>, FetchError> {
        let params = [
            ("geo", geo.to_string()),
            ("cat", category.to_string()),
            ("fi", "0".to_string()),
            ("fs", "0".to_string()),
            ("ri", "300".to_string()),
            ("rs", "20".to_string()),
            ("sort", "0".to_string()),
        ];
        let data: RealtimeResponse = self.get_json("realtimetrends", &params).await?;

        Ok(data
            .story_summaries
            .trending_stories
            .into_iter()
            .map(|s| RealtimeTrend {
                title: s.title,
                entity_names: s.entity_names,
            })
            .collect())
    }
}

/// Strip the anti-XSSI prefix and parse the remaining JSON.
pub fn parse_guarded<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    let start = body
        .find(['{', '['])
        .ok_or_else(|| FetchError::Decode("response contained no JSON".to_string()))?;
    Ok(serde_json::from_str(&body[start..])?)
}

fn find_widget<'a>(widgets: &'a [Widget], prefix: &str) -> Result<&'a Widget, FetchError> {
    widgets
        .iter()
        .find(|w| w.id.starts_with(prefix))
        .ok_or_else(|| FetchError::Decode(format!("explore response has no {prefix} widget")))
}

/// The keyword a related-searches widget is restricted to.
fn restricted_keyword(request: &Value) -> Option<String> {
    request
        .pointer("/restriction/complexKeywordsRestriction/keyword/0/value")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Unix-seconds string to "YYYY-MM-DD HH:MM:SS" (UTC); unparseable input passes through.
fn format_timestamp(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn is_breakout(formatted_value: &str) -> bool {
    formatted_value.trim().eq_ignore_ascii_case(BREAKOUT_LABEL)
}

fn to_related_query(ranked: RankedKeyword) -> RelatedQuery {
    RelatedQuery {
        query: ranked.query.unwrap_or_default(),
        value: ranked.value,
        breakout: is_breakout(&ranked.formatted_value),
        formatted_value: ranked.formatted_value,
    }
}

fn to_related_topic(ranked: RankedKeyword) -> RelatedTopic {
    let topic = ranked.topic.unwrap_or_default();
    RelatedTopic {
        mid: topic.mid,
        title: topic.title,
        topic_type: topic.topic_type,
        value: ranked.value,
        breakout: is_breakout(&ranked.formatted_value),
        formatted_value: ranked.formatted_value,
    }
}

// --- explore request/response types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExploreRequest {
    comparison_item: Vec<ComparisonItem>,
    category: u32,
    property: String,
}

#[derive(Serialize)]
struct ComparisonItem {
    keyword: String,
    time: String,
    geo: String,
}

#[derive(Deserialize)]
struct ExploreResponse {
    #[serde(default)]
    widgets: Vec<Widget>,
}

#[derive(Debug, Deserialize)]
struct Widget {
    id: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    request: Value,
}

// --- widget-data response types ---

#[derive(Deserialize)]
struct MultilineResponse {
    default: MultilineDefault,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultilineDefault {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePoint {
    time: String,
    #[serde(default)]
    value: Vec<f64>,
    #[serde(default)]
    is_partial: bool,
}

#[derive(Deserialize)]
struct ComparedGeoResponse {
    default: ComparedGeoDefault,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComparedGeoDefault {
    #[serde(default)]
    geo_map_data: Vec<GeoPoint>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoPoint {
    geo_name: String,
    #[serde(default)]
    value: Vec<f64>,
}

#[derive(Deserialize)]
struct RelatedResponse {
    default: RelatedDefault,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelatedDefault {
    #[serde(default)]
    ranked_list: Vec<RankedList>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankedList {
    #[serde(default)]
    ranked_keyword: Vec<RankedKeyword>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankedKeyword {
    query: Option<String>,
    topic: Option<TopicRef>,
    #[serde(default)]
    value: i64,
    #[serde(default)]
    formatted_value: String,
}

#[derive(Deserialize, Default)]
struct TopicRef {
    #[serde(default)]
    mid: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "type")]
    topic_type: String,
}

#[derive(Deserialize)]
struct DailyTrendsResponse {
    default: DailyTrendsDefault,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyTrendsDefault {
    #[serde(default)]
    trending_searches_days: Vec<TrendingDay>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingDay {
    #[serde(default)]
    trending_searches: Vec<TrendingSearch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingSearch {
    title: TrendingTitle,
    formatted_traffic: Option<String>,
}

#[derive(Deserialize)]
struct TrendingTitle {
    query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeResponse {
    story_summaries: StorySummaries,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorySummaries {
    #[serde(default)]
    trending_stories: Vec<TrendingStory>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingStory {
    #[serde(default)]
    title: String,
    #[serde(default)]
    entity_names: Vec<String>,
}
