//! In-memory course.
//!
//! Objects live in a map keyed by their course-relative path
//! (`pages/3`, `quizzes/1/questions/4`). Creating under a collection path
//! assigns the next id, and request bodies wrapped in a single object key
//! (`{"wiki_page": {...}}`) are unwrapped the way the platform does.
//! Platform-wide paths (`/files/9`) map onto the same course-relative keys.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{ApiError, CourseApi};

/// A request made against a [`MemoryCourse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
  Get(String),
  List(String),
  Create(String),
  Update(String),
  Delete(String),
  Upload(String),
}

impl ApiCall {
  /// Whether the call changes remote state.
  pub fn is_write(&self) -> bool {
    !matches!(self, ApiCall::Get(_) | ApiCall::List(_))
  }
}

#[derive(Debug, Default)]
struct Inner {
  objects: BTreeMap<String, Value>,
  next_id: u64,
  calls: Vec<ApiCall>,
}

#[derive(Debug)]
pub struct MemoryCourse {
  course_id: u64,
  base_url: String,
  inner: Mutex<Inner>,
}

fn normalize(path: &str) -> String {
  path.trim_matches('/').to_string()
}

fn unwrap_body(body: Value) -> Map<String, Value> {
  match body {
    Value::Object(mut map) if map.len() == 1 => {
      let only = map.keys().next().cloned().unwrap_or_default();
      match map.remove(&only) {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
          map.insert(only, other);
          map
        }
        None => map,
      }
    }
    Value::Object(map) => map,
    _ => Map::new(),
  }
}

fn merge(target: &mut Value, fields: Map<String, Value>) {
  if let Value::Object(existing) = target {
    existing.extend(fields);
  }
}

impl MemoryCourse {
  pub fn new(course_id: u64) -> Self {
    let mut inner = Inner {
      next_id: 1,
      ..Inner::default()
    };
    inner
      .objects
      .insert(String::new(), json!({"id": course_id, "name": format!("Course {course_id}")}));
    inner.objects.insert("settings".to_string(), json!({}));
    Self {
      course_id,
      base_url: "https://canvas.test".to_string(),
      inner: Mutex::new(inner),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Store an object at `path`, as if it had been created remotely.
  pub fn insert(&self, path: &str, object: Value) {
    self.lock().objects.insert(normalize(path), object);
  }

  /// Current object at `path`, without recording a call.
  pub fn object(&self, path: &str) -> Option<Value> {
    self.lock().objects.get(&normalize(path)).cloned()
  }

  /// Paths of every stored object under `prefix`.
  pub fn paths(&self, prefix: &str) -> Vec<String> {
    let prefix = normalize(prefix);
    self
      .lock()
      .objects
      .keys()
      .filter(|p| !p.is_empty() && p.starts_with(&prefix))
      .cloned()
      .collect()
  }

  pub fn calls(&self) -> Vec<ApiCall> {
    self.lock().calls.clone()
  }

  /// Calls that changed remote state.
  pub fn writes(&self) -> Vec<ApiCall> {
    self.lock().calls.iter().filter(|c| c.is_write()).cloned().collect()
  }

  pub fn clear_calls(&self) {
    self.lock().calls.clear();
  }

  fn object_url(&self, path: &str) -> String {
    format!("{}/courses/{}/{}", self.base_url, self.course_id, path)
  }

  /// Create an object under the collection `path` with the next id.
  fn store_new(&self, inner: &mut Inner, path: &str, body: Value) -> Value {
    let id = inner.next_id;
    inner.next_id += 1;
    let object_path = format!("{path}/{id}");

    let mut object = Value::Object(unwrap_body(body));
    merge(
      &mut object,
      Map::from_iter([
        ("id".to_string(), json!(id)),
        ("html_url".to_string(), json!(self.object_url(&object_path))),
      ]),
    );
    inner.objects.insert(object_path, object.clone());
    object
  }
}

#[async_trait]
impl CourseApi for MemoryCourse {
  fn course_id(&self) -> u64 {
    self.course_id
  }

  fn base_url(&self) -> &str {
    &self.base_url
  }

  async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
    let path = normalize(path);
    let mut inner = self.lock();
    inner.calls.push(ApiCall::Get(path.clone()));
    Ok(inner.objects.get(&path).cloned())
  }

  async fn list(&self, path: &str) -> Result<Vec<Value>, ApiError> {
    let path = normalize(path);
    let mut inner = self.lock();
    inner.calls.push(ApiCall::List(path.clone()));
    let prefix = format!("{path}/");
    let mut items: Vec<(u64, Value)> = inner
      .objects
      .iter()
      .filter_map(|(p, v)| {
        let rest = p.strip_prefix(&prefix)?;
        let id = rest.parse::<u64>().ok()?;
        Some((id, v.clone()))
      })
      .collect();
    items.sort_by_key(|(id, _)| *id);
    Ok(items.into_iter().map(|(_, v)| v).collect())
  }

  async fn create(&self, path: &str, body: Value) -> Result<Value, ApiError> {
    let path = normalize(path);
    let mut inner = self.lock();
    inner.calls.push(ApiCall::Create(path.clone()));
    Ok(self.store_new(&mut inner, &path, body))
  }

  async fn update(&self, path: &str, body: Value) -> Result<Value, ApiError> {
    let path = normalize(path);
    let mut inner = self.lock();
    inner.calls.push(ApiCall::Update(path.clone()));

    let Some(existing) = inner.objects.get_mut(&path) else {
      return Err(ApiError::NotFound { path });
    };
    merge(existing, unwrap_body(body));
    Ok(existing.clone())
  }

  async fn delete(&self, path: &str) -> Result<(), ApiError> {
    let path = normalize(path);
    let mut inner = self.lock();
    inner.calls.push(ApiCall::Delete(path.clone()));

    match inner.objects.remove(&path) {
      Some(_) => {
        let children = format!("{path}/");
        inner.objects.retain(|p, _| !p.starts_with(&children));
        Ok(())
      }
      None => Err(ApiError::NotFound { path }),
    }
  }

  async fn upload(&self, folder: &str, name: &str, bytes: Vec<u8>) -> Result<Value, ApiError> {
    let mut inner = self.lock();
    inner.calls.push(ApiCall::Upload(name.to_string()));
    let file = json!({
      "display_name": name,
      "filename": name,
      "folder": folder,
      "size": bytes.len(),
    });
    Ok(self.store_new(&mut inner, "files", file))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn create_assigns_ids_and_unwraps_body() {
    let course = MemoryCourse::new(42);

    let page = course
      .create("pages", json!({"wiki_page": {"title": "Intro"}}))
      .await
      .unwrap();

    assert_eq!(page["id"], 1);
    assert_eq!(page["title"], "Intro");
    assert_eq!(page["html_url"], "https://canvas.test/courses/42/pages/1");
    assert_eq!(course.object("pages/1").unwrap()["title"], "Intro");
  }

  #[tokio::test]
  async fn update_merges_fields() {
    let course = MemoryCourse::new(1);
    course.insert("quizzes/5", json!({"id": 5, "title": "Q", "published": true}));

    let quiz = course
      .update("quizzes/5", json!({"quiz": {"published": false}}))
      .await
      .unwrap();

    assert_eq!(quiz["title"], "Q");
    assert_eq!(quiz["published"], false);
  }

  #[tokio::test]
  async fn update_of_missing_object_is_not_found() {
    let course = MemoryCourse::new(1);
    let err = course.update("pages/9", json!({})).await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn delete_reports_missing_objects() {
    let course = MemoryCourse::new(1);
    course.insert("modules/2", json!({"id": 2}));
    course.insert("modules/2/items/3", json!({"id": 3}));

    course.delete("modules/2").await.unwrap();
    assert!(course.object("modules/2/items/3").is_none());
    assert!(course.delete("modules/2").await.unwrap_err().is_not_found());
  }

  #[tokio::test]
  async fn list_returns_direct_children_in_id_order() {
    let course = MemoryCourse::new(1);
    course.insert("modules/10", json!({"id": 10}));
    course.insert("modules/2", json!({"id": 2}));
    course.insert("modules/2/items/3", json!({"id": 3}));

    let modules = course.list("modules").await.unwrap();
    let ids: Vec<_> = modules.iter().map(|m| m["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![2, 10]);
  }

  #[tokio::test]
  async fn platform_paths_map_to_course_objects() {
    let course = MemoryCourse::new(1);
    let file = course.upload("course files/img", "logo.png", vec![1, 2, 3]).await.unwrap();
    let id = file["id"].as_u64().unwrap();

    course.delete(&format!("/files/{id}")).await.unwrap();
    assert!(course.paths("files").is_empty());
    assert_eq!(
      course.writes(),
      vec![
        ApiCall::Upload("logo.png".to_string()),
        ApiCall::Delete(format!("files/{id}"))
      ]
    );
  }
}
