//! In-memory `ArchiveStorage` backend.
//!
//! All tables sit behind one `tokio::sync::RwLock`, so each trait method is
//! trivially atomic. Used by the server by default and by tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use siad_core::model::{
    Archivador, AuditLog, BackupJob, Document, Expediente, RestoreLog, Signature, SignatureFlow,
    SystemConfig, Typology, Version,
};

use crate::error::StorageError;
use crate::record::{
    ArchiveRecords, AuditFilter, DocumentFilter, FileBlob, FlowFilter, ImportCounts,
    SignatureFilter, UserRecord,
};
use crate::traits::ArchiveStorage;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    archivadores: HashMap<String, Archivador>,
    expedientes: HashMap<String, Expediente>,
    typologies: HashMap<String, Typology>,
    documents: HashMap<String, Document>,
    files: HashMap<String, Vec<u8>>,
    signatures: HashMap<String, Signature>,
    versions: HashMap<String, Version>,
    flows: HashMap<String, SignatureFlow>,
    audit: Vec<AuditLog>,
    config: Option<SystemConfig>,
    backups: HashMap<String, BackupJob>,
    backup_archives: HashMap<String, Vec<u8>>,
    restores: HashMap<String, RestoreLog>,
}

impl Tables {
    fn count_documents(&self, pred: impl Fn(&Document) -> bool) -> u64 {
        self.documents.values().filter(|d| pred(d)).count() as u64
    }

    fn with_archivador_count(&self, mut a: Archivador) -> Archivador {
        a.document_count = self.count_documents(|d| d.archivador_id == a.id);
        a
    }

    fn with_expediente_count(&self, mut e: Expediente) -> Expediente {
        e.document_count = self.count_documents(|d| d.expediente_id.as_deref() == Some(&e.id));
        e
    }

    fn check_document_refs(&self, doc: &Document) -> Result<(), StorageError> {
        if !self.archivadores.contains_key(&doc.archivador_id) {
            return Err(StorageError::Conflict(format!(
                "archivador {} does not exist",
                doc.archivador_id
            )));
        }
        if let Some(id) = &doc.expediente_id {
            if !self.expedientes.contains_key(id) {
                return Err(StorageError::Conflict(format!(
                    "expediente {} does not exist",
                    id
                )));
            }
        }
        if let Some(id) = &doc.typology_id {
            if !self.typologies.contains_key(id) {
                return Err(StorageError::Conflict(format!(
                    "typology {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }

    fn email_taken(&self, email: &str, except_id: Option<&str>) -> bool {
        self.users.values().any(|r| {
            r.user.email.eq_ignore_ascii_case(email) && Some(r.user.id.as_str()) != except_id
        })
    }

    /// Insert a version as the current one, demoting any other current
    /// version of its document.
    fn put_version(&mut self, mut version: Version) {
        for v in self.versions.values_mut() {
            if v.document_id == version.document_id {
                v.is_current = false;
            }
        }
        version.is_current = true;
        self.versions.insert(version.id.clone(), version);
    }
}

/// Sort newest first by an RFC 3339 `created_at`, breaking ties by id.
fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (&str, &str)) {
    items.sort_by(|a, b| {
        let (ca, ia) = key(a);
        let (cb, ib) = key(b);
        cb.cmp(ca).then_with(|| ib.cmp(ia))
    });
}

/// Process-local storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! insert_unique {
    ($map:expr, $kind:literal, $item:expr) => {{
        let item = $item;
        if $map.contains_key(&item.id) {
            return Err(StorageError::duplicate($kind, item.id.clone()));
        }
        $map.insert(item.id.clone(), item);
        Ok(())
    }};
}

macro_rules! replace_existing {
    ($map:expr, $kind:literal, $item:expr) => {{
        let item = $item;
        match $map.get_mut(&item.id) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(StorageError::not_found($kind, item.id.clone())),
        }
    }};
}

#[async_trait]
impl ArchiveStorage for MemoryStorage {
    async fn insert_user(&self, record: UserRecord) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t.email_taken(&record.user.email, None) {
            return Err(StorageError::duplicate("user", record.user.email.clone()));
        }
        if t.users.contains_key(&record.user.id) {
            return Err(StorageError::duplicate("user", record.user.id.clone()));
        }
        t.users.insert(record.user.id.clone(), record);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<UserRecord, StorageError> {
        let t = self.tables.read().await;
        t.users
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("user", id))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<UserRecord, StorageError> {
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|r| r.user.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| StorageError::not_found("user", email))
    }

    async fn update_user(&self, record: UserRecord) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t.email_taken(&record.user.email, Some(&record.user.id)) {
            return Err(StorageError::duplicate("user", record.user.email.clone()));
        }
        match t.users.get_mut(&record.user.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StorageError::not_found("user", record.user.id.clone())),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let t = self.tables.read().await;
        let mut users: Vec<UserRecord> = t.users.values().cloned().collect();
        newest_first(&mut users, |r| (r.user.created_at.as_str(), r.user.id.as_str()));
        Ok(users)
    }

    async fn insert_archivador(&self, archivador: Archivador) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t.archivadores.values().any(|a| a.code == archivador.code) {
            return Err(StorageError::duplicate("archivador", archivador.code));
        }
        insert_unique!(t.archivadores, "archivador", archivador)
    }

    async fn get_archivador(&self, id: &str) -> Result<Archivador, StorageError> {
        let t = self.tables.read().await;
        let a = t
            .archivadores
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("archivador", id))?;
        Ok(t.with_archivador_count(a))
    }

    async fn update_archivador(&self, archivador: Archivador) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t
            .archivadores
            .values()
            .any(|a| a.code == archivador.code && a.id != archivador.id)
        {
            return Err(StorageError::duplicate("archivador", archivador.code));
        }
        replace_existing!(t.archivadores, "archivador", archivador)
    }

    async fn delete_archivador(&self, id: &str) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.archivadores.contains_key(id) {
            return Err(StorageError::not_found("archivador", id));
        }
        let docs = t.count_documents(|d| d.archivador_id == id);
        if docs > 0 {
            return Err(StorageError::Conflict(format!(
                "archivador {} still holds {} document(s)",
                id, docs
            )));
        }
        t.archivadores.remove(id);
        Ok(())
    }

    async fn list_archivadores(&self) -> Result<Vec<Archivador>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<Archivador> = t
            .archivadores
            .values()
            .cloned()
            .map(|a| t.with_archivador_count(a))
            .collect();
        newest_first(&mut items, |a| (a.created_at.as_str(), a.id.as_str()));
        Ok(items)
    }

    async fn insert_expediente(&self, expediente: Expediente) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t.expedientes.values().any(|e| e.code == expediente.code) {
            return Err(StorageError::duplicate("expediente", expediente.code));
        }
        insert_unique!(t.expedientes, "expediente", expediente)
    }

    async fn get_expediente(&self, id: &str) -> Result<Expediente, StorageError> {
        let t = self.tables.read().await;
        let e = t
            .expedientes
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("expediente", id))?;
        Ok(t.with_expediente_count(e))
    }

    async fn update_expediente(&self, expediente: Expediente) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t
            .expedientes
            .values()
            .any(|e| e.code == expediente.code && e.id != expediente.id)
        {
            return Err(StorageError::duplicate("expediente", expediente.code));
        }
        replace_existing!(t.expedientes, "expediente", expediente)
    }

    async fn delete_expediente(&self, id: &str) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.expedientes.contains_key(id) {
            return Err(StorageError::not_found("expediente", id));
        }
        let docs = t.count_documents(|d| d.expediente_id.as_deref() == Some(id));
        if docs > 0 {
            return Err(StorageError::Conflict(format!(
                "expediente {} still holds {} document(s)",
                id, docs
            )));
        }
        t.expedientes.remove(id);
        Ok(())
    }

    async fn list_expedientes(&self) -> Result<Vec<Expediente>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<Expediente> = t
            .expedientes
            .values()
            .cloned()
            .map(|e| t.with_expediente_count(e))
            .collect();
        newest_first(&mut items, |e| (e.created_at.as_str(), e.id.as_str()));
        Ok(items)
    }

    async fn insert_typology(&self, typology: Typology) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t
            .typologies
            .values()
            .any(|x| x.name.eq_ignore_ascii_case(&typology.name))
        {
            return Err(StorageError::duplicate("typology", typology.name));
        }
        insert_unique!(t.typologies, "typology", typology)
    }

    async fn list_typologies(&self) -> Result<Vec<Typology>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<Typology> = t.typologies.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn insert_document(&self, document: Document) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        t.check_document_refs(&document)?;
        insert_unique!(t.documents, "document", document)
    }

    async fn get_document(&self, id: &str) -> Result<Document, StorageError> {
        let t = self.tables.read().await;
        t.documents
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("document", id))
    }

    async fn update_document(&self, document: Document) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        t.check_document_refs(&document)?;
        replace_existing!(t.documents, "document", document)
    }

    async fn delete_document(&self, id: &str) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.documents.contains_key(id) {
            return Err(StorageError::not_found("document", id));
        }
        if t.signatures.values().any(|s| s.document_id == id) {
            return Err(StorageError::Conflict(format!(
                "document {} has signatures and cannot be deleted",
                id
            )));
        }
        t.documents.remove(id);
        t.files.remove(id);
        t.versions.retain(|_, v| v.document_id != id);
        Ok(())
    }

    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<Document> = t
            .documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        newest_first(&mut items, |d| (d.created_at.as_str(), d.id.as_str()));
        Ok(items)
    }

    async fn put_file(&self, blob: FileBlob) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.documents.contains_key(&blob.document_id) {
            return Err(StorageError::not_found("document", blob.document_id));
        }
        t.files.insert(blob.document_id, blob.data);
        Ok(())
    }

    async fn get_file(&self, document_id: &str) -> Result<FileBlob, StorageError> {
        let t = self.tables.read().await;
        t.files
            .get(document_id)
            .map(|data| FileBlob {
                document_id: document_id.to_string(),
                data: data.clone(),
            })
            .ok_or_else(|| StorageError::not_found("file", document_id))
    }

    async fn list_files(&self) -> Result<Vec<FileBlob>, StorageError> {
        let t = self.tables.read().await;
        let mut files: Vec<FileBlob> = t
            .files
            .iter()
            .map(|(id, data)| FileBlob {
                document_id: id.clone(),
                data: data.clone(),
            })
            .collect();
        files.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(files)
    }

    async fn insert_signature(&self, signature: Signature) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.documents.contains_key(&signature.document_id) {
            return Err(StorageError::Conflict(format!(
                "document {} does not exist",
                signature.document_id
            )));
        }
        insert_unique!(t.signatures, "signature", signature)
    }

    async fn get_signature(&self, id: &str) -> Result<Signature, StorageError> {
        let t = self.tables.read().await;
        t.signatures
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("signature", id))
    }

    async fn update_signature(&self, signature: Signature) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        replace_existing!(t.signatures, "signature", signature)
    }

    async fn list_signatures(
        &self,
        filter: &SignatureFilter,
    ) -> Result<Vec<Signature>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<Signature> = t
            .signatures
            .values()
            .filter(|s| {
                filter
                    .document_id
                    .as_ref()
                    .map_or(true, |d| &s.document_id == d)
                    && filter
                        .signer_id
                        .as_ref()
                        .map_or(true, |u| &s.signer_id == u)
            })
            .cloned()
            .collect();
        newest_first(&mut items, |s| (s.signed_at.as_str(), s.id.as_str()));
        Ok(items)
    }

    async fn insert_version(&self, version: Version) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if t.versions.contains_key(&version.id) {
            return Err(StorageError::duplicate("version", version.id));
        }
        if !t.documents.contains_key(&version.document_id) {
            return Err(StorageError::Conflict(format!(
                "document {} does not exist",
                version.document_id
            )));
        }
        t.put_version(version);
        Ok(())
    }

    async fn list_versions(&self, document_id: &str) -> Result<Vec<Version>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<Version> = t
            .versions
            .values()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect();
        items.sort_by_key(|v| v.version_number);
        Ok(items)
    }

    async fn insert_flow(&self, flow: SignatureFlow) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.documents.contains_key(&flow.document_id) {
            return Err(StorageError::Conflict(format!(
                "document {} does not exist",
                flow.document_id
            )));
        }
        insert_unique!(t.flows, "flow", flow)
    }

    async fn get_flow(&self, id: &str) -> Result<SignatureFlow, StorageError> {
        let t = self.tables.read().await;
        t.flows
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("flow", id))
    }

    async fn update_flow(&self, flow: SignatureFlow) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        replace_existing!(t.flows, "flow", flow)
    }

    async fn list_flows(&self, filter: &FlowFilter) -> Result<Vec<SignatureFlow>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<SignatureFlow> = t
            .flows
            .values()
            .filter(|f| {
                filter.status.map_or(true, |s| f.status == s)
                    && filter
                        .document_id
                        .as_ref()
                        .map_or(true, |d| &f.document_id == d)
                    && filter
                        .signer_id
                        .as_ref()
                        .map_or(true, |u| f.signers.iter().any(|s| &s.user_id == u))
            })
            .cloned()
            .collect();
        newest_first(&mut items, |f| (f.created_at.as_str(), f.id.as_str()));
        Ok(items)
    }

    async fn append_audit(&self, entry: AuditLog) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        t.audit.push(entry);
        Ok(())
    }

    async fn list_audit(&self, filter: &AuditFilter) -> Result<Vec<AuditLog>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<AuditLog> = t
            .audit
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        newest_first(&mut items, |e| (e.created_at.as_str(), e.id.as_str()));
        Ok(items)
    }

    async fn get_config(&self) -> Result<SystemConfig, StorageError> {
        let t = self.tables.read().await;
        Ok(t.config.clone().unwrap_or_default())
    }

    async fn put_config(&self, config: SystemConfig) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        t.config = Some(config);
        Ok(())
    }

    async fn insert_backup(&self, job: BackupJob) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        insert_unique!(t.backups, "backup", job)
    }

    async fn update_backup(&self, job: BackupJob) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        replace_existing!(t.backups, "backup", job)
    }

    async fn get_backup(&self, id: &str) -> Result<BackupJob, StorageError> {
        let t = self.tables.read().await;
        t.backups
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("backup", id))
    }

    async fn list_backups(&self) -> Result<Vec<BackupJob>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<BackupJob> = t.backups.values().cloned().collect();
        newest_first(&mut items, |b| (b.created_at.as_str(), b.id.as_str()));
        Ok(items)
    }

    async fn put_backup_archive(
        &self,
        backup_id: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        if !t.backups.contains_key(backup_id) {
            return Err(StorageError::not_found("backup", backup_id));
        }
        t.backup_archives.insert(backup_id.to_string(), bytes);
        Ok(())
    }

    async fn get_backup_archive(&self, backup_id: &str) -> Result<Vec<u8>, StorageError> {
        let t = self.tables.read().await;
        t.backup_archives
            .get(backup_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("backup archive", backup_id))
    }

    async fn insert_restore(&self, log: RestoreLog) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        insert_unique!(t.restores, "restore", log)
    }

    async fn update_restore(&self, log: RestoreLog) -> Result<(), StorageError> {
        let mut t = self.tables.write().await;
        replace_existing!(t.restores, "restore", log)
    }

    async fn get_restore(&self, id: &str) -> Result<RestoreLog, StorageError> {
        let t = self.tables.read().await;
        t.restores
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("restore", id))
    }

    async fn list_restores(&self) -> Result<Vec<RestoreLog>, StorageError> {
        let t = self.tables.read().await;
        let mut items: Vec<RestoreLog> = t.restores.values().cloned().collect();
        newest_first(&mut items, |r| (r.created_at.as_str(), r.id.as_str()));
        Ok(items)
    }

    async fn export_records(&self) -> Result<ArchiveRecords, StorageError> {
        let t = self.tables.read().await;
        let mut records = ArchiveRecords {
            users: t.users.values().cloned().collect(),
            archivadores: t.archivadores.values().cloned().collect(),
            expedientes: t.expedientes.values().cloned().collect(),
            typologies: t.typologies.values().cloned().collect(),
            documents: t.documents.values().cloned().collect(),
            versions: t.versions.values().cloned().collect(),
            signatures: t.signatures.values().cloned().collect(),
            flows: t.flows.values().cloned().collect(),
            audit: t.audit.clone(),
            config: t.config.clone(),
        };
        // Deterministic archive layout.
        records.users.sort_by(|a, b| a.user.id.cmp(&b.user.id));
        records.archivadores.sort_by(|a, b| a.id.cmp(&b.id));
        records.expedientes.sort_by(|a, b| a.id.cmp(&b.id));
        records.typologies.sort_by(|a, b| a.id.cmp(&b.id));
        records.documents.sort_by(|a, b| a.id.cmp(&b.id));
        records.versions.sort_by(|a, b| {
            (&a.document_id, a.version_number).cmp(&(&b.document_id, b.version_number))
        });
        records.signatures.sort_by(|a, b| a.id.cmp(&b.id));
        records.flows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn import_records(&self, records: ArchiveRecords) -> Result<ImportCounts, StorageError> {
        let mut t = self.tables.write().await;
        let mut counts = ImportCounts::default();

        fn tally(counts: &mut ImportCounts, inserted: bool) {
            if inserted {
                counts.restored += 1;
            } else {
                counts.skipped += 1;
            }
        }

        // Parents before children so references resolve.
        for r in records.users {
            let fresh = !t.users.contains_key(&r.user.id) && !t.email_taken(&r.user.email, None);
            if fresh {
                t.users.insert(r.user.id.clone(), r);
            }
            tally(&mut counts, fresh);
        }
        for a in records.archivadores {
            let fresh = !t.archivadores.contains_key(&a.id);
            if fresh {
                t.archivadores.insert(a.id.clone(), a);
            }
            tally(&mut counts, fresh);
        }
        for e in records.expedientes {
            let fresh = !t.expedientes.contains_key(&e.id);
            if fresh {
                t.expedientes.insert(e.id.clone(), e);
            }
            tally(&mut counts, fresh);
        }
        for ty in records.typologies {
            let fresh = !t.typologies.contains_key(&ty.id);
            if fresh {
                t.typologies.insert(ty.id.clone(), ty);
            }
            tally(&mut counts, fresh);
        }
        for d in records.documents {
            let fresh = !t.documents.contains_key(&d.id);
            if fresh {
                t.documents.insert(d.id.clone(), d);
            }
            tally(&mut counts, fresh);
        }
        // Documents that already had a current version keep it; everywhere
        // else the archived flags are taken as they are.
        let live_current: HashSet<String> = t
            .versions
            .values()
            .filter(|v| v.is_current)
            .map(|v| v.document_id.clone())
            .collect();
        for mut v in records.versions {
            let fresh = !t.versions.contains_key(&v.id);
            if fresh {
                if live_current.contains(&v.document_id) {
                    v.is_current = false;
                }
                t.versions.insert(v.id.clone(), v);
            }
            tally(&mut counts, fresh);
        }
        for s in records.signatures {
            let fresh = !t.signatures.contains_key(&s.id);
            if fresh {
                t.signatures.insert(s.id.clone(), s);
            }
            tally(&mut counts, fresh);
        }
        for f in records.flows {
            let fresh = !t.flows.contains_key(&f.id);
            if fresh {
                t.flows.insert(f.id.clone(), f);
            }
            tally(&mut counts, fresh);
        }
        for entry in records.audit {
            let fresh = !t.audit.iter().any(|e| e.id == entry.id);
            if fresh {
                t.audit.push(entry);
            }
            tally(&mut counts, fresh);
        }
        if let Some(config) = records.config {
            let fresh = t.config.is_none();
            if fresh {
                t.config = Some(config);
            }
            tally(&mut counts, fresh);
        }
        Ok(counts)
    }

    async fn import_files(&self, files: Vec<FileBlob>) -> Result<ImportCounts, StorageError> {
        let mut t = self.tables.write().await;
        let mut counts = ImportCounts::default();
        for blob in files {
            if t.files.contains_key(&blob.document_id) {
                counts.skipped += 1;
            } else {
                t.files.insert(blob.document_id, blob.data);
                counts.restored += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test]
    async fn memory_storage_passes_conformance() {
        let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }
}
