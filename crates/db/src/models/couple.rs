use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    StoreError,
    policy::{Actor, Operation, RowPolicy, authorize, retain_readable},
};

/// Unordered pair of distinct profiles, normalised so that `low < high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
pub struct CouplePair {
    pub low: Uuid,
    pub high: Uuid,
}

impl CouplePair {
    /// `None` when both ids are the same profile.
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.low == id || self.high == id
    }

    pub fn other(&self, id: Uuid) -> Option<Uuid> {
        if self.low == id {
            Some(self.high)
        } else if self.high == id {
            Some(self.low)
        } else {
            None
        }
    }

    pub fn members(&self) -> [Uuid; 2] {
        [self.low, self.high]
    }

    pub(crate) fn is_member(&self, actor: &Actor) -> bool {
        actor.user_id().is_some_and(|id| self.contains(id))
    }
}

/// The symmetric partner relation. One row per linked couple.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Couple {
    pub id: Uuid,
    pub member_low: Uuid,
    pub member_high: Uuid,
    pub created_at: DateTime<Utc>,
}

impl RowPolicy for Couple {
    const RESOURCE: &'static str = "couple";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        match op {
            Operation::Read => actor.is_service() || self.pair().is_member(actor),
            Operation::Insert => self.pair().is_member(actor),
            Operation::Update | Operation::Delete => false,
        }
    }
}

impl Couple {
    pub fn pair(&self) -> CouplePair {
        CouplePair {
            low: self.member_low,
            high: self.member_high,
        }
    }

    /// Links both profiles. Fails with `Conflict` if either is already linked.
    pub async fn create<'e, E>(
        executor: E,
        actor: &Actor,
        pair: CouplePair,
    ) -> Result<Self, StoreError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let couple = Couple {
            id: Uuid::new_v4(),
            member_low: pair.low,
            member_high: pair.high,
            created_at: Utc::now(),
        };
        authorize(&couple, actor, Operation::Insert)?;

        sqlx::query("INSERT INTO couples (id, member_low, member_high) VALUES ($1, $2, $3)")
            .bind(couple.id)
            .bind(couple.member_low)
            .bind(couple.member_high)
            .execute(executor)
            .await
            .map_err(|e| StoreError::from_write(e, "Already linked with a partner"))?;

        Ok(couple)
    }

    /// Unchecked lookup of the couple `user_id` belongs to.
    pub async fn find_for_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Couple>(
            "SELECT id, member_low, member_high, created_at
               FROM couples
              WHERE member_low = $1 OR member_high = $1",
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn partner_of<'e, E>(executor: E, user_id: Uuid) -> Result<Option<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        Ok(Self::find_for_user(executor, user_id)
            .await?
            .and_then(|couple| couple.pair().other(user_id)))
    }

    pub async fn list_all(pool: &SqlitePool, actor: &Actor) -> Result<Vec<Self>, StoreError> {
        let couples = sqlx::query_as::<_, Couple>(
            "SELECT id, member_low, member_high, created_at FROM couples ORDER BY created_at",
        )
        .fetch_all(pool)
        .await?;
        Ok(retain_readable(couples, actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DBService, models::profile::Profile};

    async fn profile(db: &DBService, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut conn = db.pool.acquire().await.unwrap();
        Profile::create(&mut conn, &Actor::User(id), id, email, None)
            .await
            .unwrap();
        id
    }

    #[test]
    fn pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(CouplePair::new(a, b), CouplePair::new(b, a));
        assert!(CouplePair::new(a, a).is_none());

        let pair = CouplePair::new(a, b).unwrap();
        assert!(pair.low < pair.high);
        assert_eq!(pair.other(a), Some(b));
        assert_eq!(pair.other(Uuid::new_v4()), None);
    }

    #[tokio::test]
    async fn each_profile_joins_at_most_one_couple() {
        let db = DBService::new_in_memory().await.unwrap();
        let a = profile(&db, "a@example.com").await;
        let b = profile(&db, "b@example.com").await;
        let c = profile(&db, "c@example.com").await;

        let pair = CouplePair::new(a, b).unwrap();
        Couple::create(&db.pool, &Actor::User(a), pair).await.unwrap();

        let err = Couple::create(&db.pool, &Actor::User(c), CouplePair::new(c, b).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let err = Couple::create(&db.pool, &Actor::User(b), pair).await.unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(Couple::partner_of(&db.pool, a).await.unwrap(), Some(b));
        assert_eq!(Couple::partner_of(&db.pool, b).await.unwrap(), Some(a));
        assert_eq!(Couple::partner_of(&db.pool, c).await.unwrap(), None);

        let linked = Profile::find_by_id(&db.pool, b).await.unwrap().unwrap();
        assert_eq!(linked.partner_id, Some(a));
    }

    #[tokio::test]
    async fn outsiders_cannot_link_others() {
        let db = DBService::new_in_memory().await.unwrap();
        let a = profile(&db, "a@example.com").await;
        let b = profile(&db, "b@example.com").await;
        let c = profile(&db, "c@example.com").await;

        let err = Couple::create(&db.pool, &Actor::User(c), CouplePair::new(a, b).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));
    }
}
