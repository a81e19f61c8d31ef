use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;

/// Course material a quiz can be generated from
#[derive(Debug, Clone)]
pub struct Document {
    pub id: i64,
    pub owner_id: i64,
    pub source_path: String,
    pub filename: String,
    pub content_type: String,
    pub content: String,
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewDocument<'a> {
    pub source_path: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub content: &'a str,
    pub tags: Option<&'a str>,
}

const DOCUMENT_COLUMNS: &str = "d.id, d.owner_id, d.source_path, d.filename, d.content_type, d.content, d.tags, d.created_at";

pub struct DocumentStore<'a> {
    db: &'a Database,
}

impl<'a> DocumentStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a new document
    pub fn insert(&self, owner_id: i64, doc: &NewDocument, now: DateTime<Utc>) -> Result<i64> {
        let now = to_db_time(now);

        self.db.conn.execute(
            "INSERT INTO documents (owner_id, source_path, filename, content_type, content, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![owner_id, doc.source_path, doc.filename, doc.content_type, doc.content, doc.tags, now],
        ).context("Failed to insert document")?;

        Ok(self.db.conn.last_insert_rowid())
    }

    /// Get a document by ID
    pub fn get(&self, id: i64) -> Result<Option<Document>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {} FROM documents d WHERE d.id = ?1",
            DOCUMENT_COLUMNS
        ))?;

        let mut rows = stmt.query(params![id])?;

        if let Some(row) = rows.next()? {
            Ok(Some(Self::row_to_document(row)?))
        } else {
            Ok(None)
        }
    }

    /// List a user's documents, newest first
    pub fn list(&self, owner_id: i64) -> Result<Vec<Document>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {} FROM documents d WHERE d.owner_id = ?1 ORDER BY d.created_at DESC, d.id DESC",
            DOCUMENT_COLUMNS
        ))?;

        let mut rows = stmt.query(params![owner_id])?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            documents.push(Self::row_to_document(row)?);
        }

        Ok(documents)
    }

    /// Search a user's documents using full-text search
    pub fn search(&self, owner_id: i64, query: &str) -> Result<Vec<Document>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {}
             FROM documents d
             JOIN documents_fts fts ON d.id = fts.rowid
             WHERE documents_fts MATCH ?1 AND d.owner_id = ?2
             ORDER BY rank",
            DOCUMENT_COLUMNS
        ))?;

        let mut rows = stmt
            .query(params![query, owner_id])
            .with_context(|| format!("Invalid search query '{}'", query))?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            documents.push(Self::row_to_document(row)?);
        }

        Ok(documents)
    }

    /// Delete a document owned by the user
    pub fn delete(&self, owner_id: i64, id: i64) -> Result<bool> {
        let affected = self.db.conn.execute(
            "DELETE FROM documents WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;

        Ok(affected > 0)
    }

    pub fn count(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// Check if the user already added a document from this path
    pub fn exists_by_path(&self, owner_id: i64, source_path: &str) -> Result<bool> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE owner_id = ?1 AND source_path = ?2",
            params![owner_id, source_path],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn row_to_document(row: &rusqlite::Row) -> Result<Document> {
        let created_str: String = row.get(7)?;

        Ok(Document {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            source_path: row.get(2)?,
            filename: row.get(3)?,
            content_type: row.get(4)?,
            content: row.get(5)?,
            tags: row.get(6)?,
            created_at: from_db_time(&created_str)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_db;
    use crate::storage::UserStore;
    use crate::users::Role;

    fn note<'a>(path: &'a str, content: &'a str) -> NewDocument<'a> {
        NewDocument {
            source_path: path,
            filename: path.rsplit('/').next().unwrap_or(path),
            content_type: "text",
            content,
            tags: None,
        }
    }

    #[test]
    fn test_documents_are_scoped_to_owner() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let users = UserStore::new(&db);
        let alice = users.create("alice", Role::Student, now).unwrap();
        let bob = users.create("bob", Role::Student, now).unwrap();

        let store = DocumentStore::new(&db);
        let id = store
            .insert(alice, &note("/notes/cells.txt", "Mitochondria make ATP"), now)
            .unwrap();
        store
            .insert(bob, &note("/notes/war.txt", "The treaty ended the war"), now)
            .unwrap();

        assert_eq!(store.count(alice).unwrap(), 1);
        assert!(store.exists_by_path(alice, "/notes/cells.txt").unwrap());
        assert!(!store.exists_by_path(bob, "/notes/cells.txt").unwrap());

        let hits = store.search(alice, "mitochondria").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "cells.txt");
        assert!(store.search(bob, "mitochondria").unwrap().is_empty());

        assert!(!store.delete(bob, id).unwrap());
        assert!(store.delete(alice, id).unwrap());
        assert!(store.get(id).unwrap().is_none());
        assert!(store.search(alice, "mitochondria").unwrap().is_empty());
    }
}
