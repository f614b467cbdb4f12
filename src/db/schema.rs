pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    extracted_path TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'uploaded',
    current_phase TEXT,
    analysis_started_at TEXT,
    analysis_completed_at TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis_runs (
    id TEXT PRIMARY KEY,
    snapshot_id TEXT NOT NULL REFERENCES snapshots(id),
    frameworks TEXT NOT NULL,
    depth TEXT NOT NULL,
    phase TEXT,
    phase_status TEXT NOT NULL DEFAULT 'pending',
    progress INTEGER NOT NULL DEFAULT 0,
    metrics TEXT NOT NULL DEFAULT '{}',
    error_log TEXT NOT NULL DEFAULT '[]',
    phase_history TEXT NOT NULL DEFAULT '[]',
    created_by TEXT NOT NULL,
    heartbeat_at TEXT,
    started_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS repository_findings (
    id TEXT PRIMARY KEY,
    snapshot_id TEXT NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    control_id TEXT NOT NULL,
    framework TEXT NOT NULL,
    status TEXT NOT NULL,
    confidence TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    summary TEXT NOT NULL,
    detail TEXT NOT NULL,
    evidence TEXT NOT NULL DEFAULT '[]',
    recommendation TEXT NOT NULL,
    human_override TEXT,
    reviewed_by TEXT,
    reviewed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repository_tasks (
    id TEXT PRIMARY KEY,
    snapshot_id TEXT NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    finding_id TEXT NOT NULL REFERENCES repository_findings(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'open',
    assigned_role TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    user_id TEXT,
    organization_id TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

DROP INDEX IF EXISTS idx_runs_one_active_per_snapshot;
CREATE UNIQUE INDEX IF NOT EXISTS idx_runs_one_unfinished_per_snapshot
    ON analysis_runs(snapshot_id) WHERE completed_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_runs_snapshot ON analysis_runs(snapshot_id);
CREATE INDEX IF NOT EXISTS idx_runs_status ON analysis_runs(phase_status);
CREATE INDEX IF NOT EXISTS idx_findings_snapshot ON repository_findings(snapshot_id);
CREATE INDEX IF NOT EXISTS idx_findings_status ON repository_findings(status);
CREATE INDEX IF NOT EXISTS idx_tasks_finding ON repository_tasks(finding_id);
CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id);
";
