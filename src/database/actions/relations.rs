use std::future::Future;

use sqlx::{Pool, Postgres};

use crate::{
    error::{Conflict, NotFound, QueryError, ValidationError},
    schema::Uuid,
};

/// Where a user-to-target relation is stored and how its failures are reported.
#[derive(Debug, PartialEq)]
pub struct RelationTable {
    pub table: &'static str,
    pub target_table: &'static str,
    pub target_column: &'static str,
    pub allow_self: bool,
    pub missing_target: &'static str,
    pub duplicate: &'static str,
    pub missing: &'static str,
}

pub const FAVORITES: RelationTable = RelationTable {
    table: "favorite_recipes",
    target_table: "recipes",
    target_column: "recipe_id",
    allow_self: true,
    missing_target: "No recipe exists with specified id",
    duplicate: "Recipe is already in favorites.",
    missing: "Recipe is not in favorites.",
};

pub const SHOPPING_CART: RelationTable = RelationTable {
    table: "cart_recipes",
    target_table: "recipes",
    target_column: "recipe_id",
    allow_self: true,
    missing_target: "No recipe exists with specified id",
    duplicate: "Recipe is already in the shopping cart.",
    missing: "Recipe is not in the shopping cart.",
};

pub const SUBSCRIPTIONS: RelationTable = RelationTable {
    table: "subscriptions",
    target_table: "users",
    target_column: "author_id",
    allow_self: false,
    missing_target: "No user exists with specified id",
    duplicate: "You are already subscribed to this user.",
    missing: "You are not subscribed to this user.",
};

/// Storage of a unique (target, user) relation.
pub trait Relation {
    fn table(&self) -> &RelationTable;

    fn target_exists(
        &self,
        target_id: Uuid,
    ) -> impl Future<Output = Result<bool, potion::Error>> + Send;

    /// Returns `false` when the pair already exists.
    fn create(
        &self,
        target_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<bool, potion::Error>> + Send;

    fn find(
        &self,
        target_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Option<Uuid>, potion::Error>> + Send;

    fn delete(&self, row_id: Uuid) -> impl Future<Output = Result<(), potion::Error>> + Send;
}

pub async fn follow<R: Relation>(
    relation: &R,
    target_id: Uuid,
    user_id: Uuid,
) -> Result<(), potion::Error> {
    let table = relation.table();

    if !table.allow_self && target_id == user_id {
        return Err(ValidationError::new("errors", "You cannot subscribe to yourself.").into());
    }

    if !relation.target_exists(target_id).await? {
        return Err(NotFound::new(table.missing_target).into());
    }

    if !relation.create(target_id, user_id).await? {
        return Err(Conflict::new(table.duplicate).into());
    }

    log::info!("User {user_id} added {target_id} to {}", table.table);

    Ok(())
}

pub async fn unfollow<R: Relation>(
    relation: &R,
    target_id: Uuid,
    user_id: Uuid,
) -> Result<(), potion::Error> {
    let table = relation.table();

    let row_id = relation
        .find(target_id, user_id)
        .await?
        .ok_or_else(|| NotFound::new(table.missing))?;

    relation.delete(row_id).await?;

    log::info!("User {user_id} removed {target_id} from {}", table.table);

    Ok(())
}

pub struct PgRelation<'a> {
    pool: &'a Pool<Postgres>,
    table: &'static RelationTable,
}

impl<'a> PgRelation<'a> {
    pub fn favorites(pool: &'a Pool<Postgres>) -> Self {
        Self {
            pool,
            table: &FAVORITES,
        }
    }

    pub fn shopping_cart(pool: &'a Pool<Postgres>) -> Self {
        Self {
            pool,
            table: &SHOPPING_CART,
        }
    }

    pub fn subscriptions(pool: &'a Pool<Postgres>) -> Self {
        Self {
            pool,
            table: &SUBSCRIPTIONS,
        }
    }
}

impl Relation for PgRelation<'_> {
    fn table(&self) -> &RelationTable {
        self.table
    }

    async fn target_exists(&self, target_id: Uuid) -> Result<bool, potion::Error> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            self.table.target_table
        );
        let (exists,): (bool,) = sqlx::query_as(&sql)
            .bind(target_id)
            .fetch_one(self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(exists)
    }

    async fn create(&self, target_id: Uuid, user_id: Uuid) -> Result<bool, potion::Error> {
        let sql = format!(
            "INSERT INTO {} ({}, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            self.table.table, self.table.target_column
        );
        let result = sqlx::query(&sql)
            .bind(target_id)
            .bind(user_id)
            .execute(self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find(&self, target_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, potion::Error> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} = $1 AND user_id = $2",
            self.table.table, self.table.target_column
        );
        let row: Option<(Uuid,)> = sqlx::query_as(&sql)
            .bind(target_id)
            .bind(user_id)
            .fetch_optional(self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(row.map(|(id,)| id))
    }

    async fn delete(&self, row_id: Uuid) -> Result<(), potion::Error> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table.table);
        sqlx::query(&sql)
            .bind(row_id)
            .execute(self.pool)
            .await
            .map_err(QueryError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Mutex};

    use super::*;
    use crate::error::status_of;

    struct MemoryRelation {
        table: &'static RelationTable,
        targets: HashSet<Uuid>,
        rows: Mutex<Vec<(Uuid, Uuid, Uuid)>>,
    }

    impl MemoryRelation {
        fn new(table: &'static RelationTable, targets: &[Uuid]) -> Self {
            Self {
                table,
                targets: targets.iter().copied().collect(),
                rows: Mutex::new(vec![]),
            }
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    impl Relation for MemoryRelation {
        fn table(&self) -> &RelationTable {
            self.table
        }

        async fn target_exists(&self, target_id: Uuid) -> Result<bool, potion::Error> {
            Ok(self.targets.contains(&target_id))
        }

        async fn create(&self, target_id: Uuid, user_id: Uuid) -> Result<bool, potion::Error> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|(_, t, u)| *t == target_id && *u == user_id) {
                return Ok(false);
            }
            let id = rows.len() as Uuid + 1;
            rows.push((id, target_id, user_id));
            Ok(true)
        }

        async fn find(&self, target_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, potion::Error> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|(_, t, u)| *t == target_id && *u == user_id)
                .map(|(id, _, _)| *id))
        }

        async fn delete(&self, row_id: Uuid) -> Result<(), potion::Error> {
            self.rows.lock().unwrap().retain(|(id, _, _)| *id != row_id);
            Ok(())
        }
    }

    fn code(result: Result<(), potion::Error>) -> u16 {
        match result {
            Ok(()) => 200,
            Err(e) => status_of(&e),
        }
    }

    #[tokio::test]
    async fn favoriting_twice_conflicts() {
        let favorites = MemoryRelation::new(&FAVORITES, &[7]);

        assert_eq!(code(follow(&favorites, 7, 1).await), 200);
        assert_eq!(code(follow(&favorites, 7, 1).await), 409);
        assert_eq!(code(follow(&favorites, 7, 2).await), 200);
        assert_eq!(favorites.len(), 2);
    }

    #[tokio::test]
    async fn following_missing_target_is_not_found() {
        let cart = MemoryRelation::new(&SHOPPING_CART, &[7]);

        assert_eq!(code(follow(&cart, 8, 1).await), 404);
        assert_eq!(cart.len(), 0);
    }

    #[tokio::test]
    async fn unfollowing_without_relation_is_not_found() {
        let favorites = MemoryRelation::new(&FAVORITES, &[7]);

        assert_eq!(code(unfollow(&favorites, 7, 1).await), 404);

        follow(&favorites, 7, 1).await.ok().unwrap();
        assert_eq!(code(unfollow(&favorites, 7, 1).await), 200);
        assert_eq!(favorites.len(), 0);
        assert_eq!(code(unfollow(&favorites, 7, 1).await), 404);
    }

    #[tokio::test]
    async fn cannot_subscribe_to_self() {
        let subscriptions = MemoryRelation::new(&SUBSCRIPTIONS, &[1, 2]);

        assert_eq!(code(follow(&subscriptions, 1, 1).await), 400);
        assert_eq!(code(follow(&subscriptions, 2, 1).await), 200);
    }
}
