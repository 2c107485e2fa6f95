//! Import from a Nextcloud Cookbook instance.

use std::fmt;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::{RecipyaError, Result};
use crate::images::UploadImage;
use crate::model::{Recipe, Recipes};
use crate::schema::RecipeSchema;

const API_PATH: &str = "/apps/cookbook/api/v1/recipes";

/// Progress of a running import: `value` of `total` recipes processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub value: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RecipeId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipeId::Number(n) => write!(f, "{n}"),
            RecipeId::Text(s) => f.write_str(s),
        }
    }
}

/// Older Cookbook versions list `recipe_id`, newer ones `id`.
#[derive(Debug, Deserialize)]
struct RecipeSummary {
    #[serde(default)]
    recipe_id: Option<RecipeId>,
    #[serde(default)]
    id: Option<RecipeId>,
}

impl RecipeSummary {
    fn id(self) -> Option<String> {
        self.recipe_id.or(self.id).map(|id| id.to_string())
    }
}

#[derive(Clone)]
pub struct NextcloudImporter {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl NextcloudImporter {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Recipya/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(format!("{}{}{}", self.base_url, API_PATH, path))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }

    /// Fetch every recipe of the account.
    ///
    /// Only a failed listing is an error. Recipes that fail to download leave
    /// a default recipe in their slot, and every worker reports progress on
    /// `progress` whether it succeeded or not. The caller must drain the
    /// channel or the workers stall.
    pub async fn import(
        &self,
        images: Arc<dyn UploadImage>,
        progress: mpsc::Sender<Progress>,
    ) -> Result<Recipes> {
        let summaries: Vec<RecipeSummary> = self.get("").await?.json().await?;
        let ids: Vec<String> = summaries.into_iter().filter_map(RecipeSummary::id).collect();
        let total = ids.len();
        info!("Importing {} recipes from {}", total, self.base_url);

        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let importer = self.clone();
                let images = Arc::clone(&images);
                let progress = progress.clone();
                let done = Arc::clone(&done);
                tokio::spawn(async move {
                    let recipe = match importer.fetch_recipe(&id, images).await {
                        Ok(recipe) => recipe,
                        Err(err) => {
                            warn!("Failed to import Nextcloud recipe {}: {}", id, err);
                            Recipe::default()
                        }
                    };
                    let value = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if progress.send(Progress { value, total }).await.is_err() {
                        debug!("Progress receiver dropped");
                    }
                    recipe
                })
            })
            .collect();

        let mut recipes = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(recipe) => recipes.push(recipe),
                Err(err) => {
                    warn!("Nextcloud import worker failed: {}", err);
                    recipes.push(Recipe::default());
                }
            }
        }
        Ok(recipes)
    }

    async fn fetch_recipe(&self, id: &str, images: Arc<dyn UploadImage>) -> Result<Recipe> {
        let body = self.get(&format!("/{id}")).await?.bytes().await?;
        let mut recipe = RecipeSchema::from_slice(&body)?.recipe()?;
        recipe.image = None;

        match self.fetch_thumbnail(id, images).await {
            Ok(image) => recipe.image = Some(image),
            Err(err) => warn!("No image for Nextcloud recipe {}: {}", id, err),
        }
        Ok(recipe)
    }

    async fn fetch_thumbnail(&self, id: &str, images: Arc<dyn UploadImage>) -> Result<uuid::Uuid> {
        let bytes = self.get(&format!("/{id}/image?size=thumb")).await?.bytes().await?;
        tokio::task::spawn_blocking(move || images.upload_image(&mut Cursor::new(bytes)))
            .await
            .map_err(|e| RecipyaError::Worker(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_accepts_both_id_shapes() {
        let summaries: Vec<RecipeSummary> = serde_json::from_str(
            r#"[{"recipe_id":3,"name":"A"},{"id":"7","name":"B"},{"name":"C"}]"#,
        )
        .unwrap();
        let ids: Vec<String> = summaries.into_iter().filter_map(RecipeSummary::id).collect();
        assert_eq!(ids, vec!["3", "7"]);
    }
}
