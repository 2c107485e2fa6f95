//! Contract with the relational persistence layer, plus an in-memory
//! implementation used by the binary's default wiring and by tests.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Cookbook, Recipe, Recipes, ShareLink, ShareTarget};

/// Read and write access to users' recipes, cookbooks and share links
#[async_trait]
pub trait Repository: Send + Sync {
    /// Every user owning at least one recipe, cookbook or share link
    async fn user_ids(&self) -> Result<Vec<i64>>;

    async fn recipes(&self, user_id: i64) -> Result<Recipes>;

    /// Cookbooks with their member recipes in order
    async fn cookbooks(&self, user_id: i64) -> Result<Vec<Cookbook>>;

    async fn share_links(&self, user_id: i64) -> Result<Vec<ShareLink>>;

    /// Store recipes for a user, returning their new ids in order
    async fn add_recipes(&self, user_id: i64, recipes: Recipes) -> Result<Vec<i64>>;

    async fn add_cookbook(&self, user_id: i64, title: &str, image: Option<Uuid>) -> Result<i64>;

    async fn add_recipe_to_cookbook(&self, user_id: i64, cookbook_id: i64, recipe_id: i64) -> Result<()>;

    async fn add_share_link(&self, link: ShareLink) -> Result<()>;

    /// Delete a recipe and drop it from every cookbook
    async fn delete_recipe(&self, user_id: i64, recipe_id: i64) -> Result<()>;

    /// Delete a cookbook; its recipes stay
    async fn delete_cookbook(&self, user_id: i64, cookbook_id: i64) -> Result<()>;
}

struct CookbookRow {
    title: String,
    image: Option<Uuid>,
    user_id: i64,
    recipe_ids: Vec<i64>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    recipes: BTreeMap<i64, (i64, Recipe)>,
    cookbooks: BTreeMap<i64, CookbookRow>,
    share_links: Vec<ShareLink>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn user_ids(&self) -> Result<Vec<i64>> {
        let state = self.state.read().await;
        let users: BTreeSet<i64> = state
            .recipes
            .values()
            .map(|(user_id, _)| *user_id)
            .chain(state.cookbooks.values().map(|c| c.user_id))
            .chain(state.share_links.iter().map(|l| l.user_id))
            .collect();
        Ok(users.into_iter().collect())
    }

    async fn recipes(&self, user_id: i64) -> Result<Recipes> {
        let state = self.state.read().await;
        Ok(state
            .recipes
            .values()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, recipe)| recipe.clone())
            .collect())
    }

    async fn cookbooks(&self, user_id: i64) -> Result<Vec<Cookbook>> {
        let state = self.state.read().await;
        Ok(state
            .cookbooks
            .iter()
            .filter(|(_, row)| row.user_id == user_id)
            .map(|(id, row)| Cookbook {
                id: *id,
                title: row.title.clone(),
                image: row.image,
                recipes: row
                    .recipe_ids
                    .iter()
                    .filter_map(|rid| state.recipes.get(rid).map(|(_, r)| r.clone()))
                    .collect(),
                user_id: row.user_id,
            })
            .collect())
    }

    async fn share_links(&self, user_id: i64) -> Result<Vec<ShareLink>> {
        let state = self.state.read().await;
        Ok(state
            .share_links
            .iter()
            .filter(|link| link.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_recipes(&self, user_id: i64, recipes: Recipes) -> Result<Vec<i64>> {
        let mut state = self.state.write().await;
        let mut ids = Vec::with_capacity(recipes.len());
        for mut recipe in recipes {
            let id = state.next_id();
            recipe.id = id;
            state.recipes.insert(id, (user_id, recipe));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn add_cookbook(&self, user_id: i64, title: &str, image: Option<Uuid>) -> Result<i64> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        state.cookbooks.insert(
            id,
            CookbookRow {
                title: title.to_string(),
                image,
                user_id,
                recipe_ids: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn add_recipe_to_cookbook(&self, user_id: i64, cookbook_id: i64, recipe_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let owns_recipe = state
            .recipes
            .get(&recipe_id)
            .is_some_and(|(owner, _)| *owner == user_id);
        if let Some(row) = state.cookbooks.get_mut(&cookbook_id) {
            if row.user_id == user_id && owns_recipe && !row.recipe_ids.contains(&recipe_id) {
                row.recipe_ids.push(recipe_id);
            }
        }
        Ok(())
    }

    async fn add_share_link(&self, link: ShareLink) -> Result<()> {
        self.state.write().await.share_links.push(link);
        Ok(())
    }

    async fn delete_recipe(&self, user_id: i64, recipe_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if !state
            .recipes
            .get(&recipe_id)
            .is_some_and(|(owner, _)| *owner == user_id)
        {
            return Ok(());
        }
        state.recipes.remove(&recipe_id);
        for row in state.cookbooks.values_mut() {
            row.recipe_ids.retain(|id| *id != recipe_id);
        }
        state
            .share_links
            .retain(|link| link.target != ShareTarget::Recipe(recipe_id));
        Ok(())
    }

    async fn delete_cookbook(&self, user_id: i64, cookbook_id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .cookbooks
            .get(&cookbook_id)
            .is_some_and(|row| row.user_id == user_id)
        {
            state.cookbooks.remove(&cookbook_id);
            state
                .share_links
                .retain(|link| link.target != ShareTarget::Cookbook(cookbook_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Recipe {
        Recipe {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_delete_recipe_leaves_cookbooks() {
        let repo = MemoryRepository::new();
        let ids = repo.add_recipes(1, vec![named("Bread"), named("Soup")]).await.unwrap();
        let cookbook = repo.add_cookbook(1, "Family", None).await.unwrap();
        repo.add_recipe_to_cookbook(1, cookbook, ids[0]).await.unwrap();
        repo.add_recipe_to_cookbook(1, cookbook, ids[1]).await.unwrap();

        repo.delete_recipe(1, ids[0]).await.unwrap();

        let cookbooks = repo.cookbooks(1).await.unwrap();
        assert_eq!(cookbooks.len(), 1);
        let names: Vec<_> = cookbooks[0].recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Soup"]);
    }

    #[tokio::test]
    async fn test_delete_cookbook_keeps_recipes() {
        let repo = MemoryRepository::new();
        let ids = repo.add_recipes(1, vec![named("Bread")]).await.unwrap();
        let cookbook = repo.add_cookbook(1, "Family", None).await.unwrap();
        repo.add_recipe_to_cookbook(1, cookbook, ids[0]).await.unwrap();
        repo.add_share_link(ShareLink {
            link: Uuid::new_v4(),
            target: ShareTarget::Cookbook(cookbook),
            user_id: 1,
        })
        .await
        .unwrap();

        repo.delete_cookbook(1, cookbook).await.unwrap();

        assert!(repo.cookbooks(1).await.unwrap().is_empty());
        assert!(repo.share_links(1).await.unwrap().is_empty());
        assert_eq!(repo.recipes(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let repo = MemoryRepository::new();
        repo.add_recipes(1, vec![named("Bread")]).await.unwrap();
        let other = repo.add_recipes(2, vec![named("Tea")]).await.unwrap();

        repo.delete_recipe(1, other[0]).await.unwrap();

        assert_eq!(repo.recipes(2).await.unwrap().len(), 1);
        assert_eq!(repo.user_ids().await.unwrap(), vec![1, 2]);
    }
}
