//! SQLite 学习数据存储
//!
//! 使用 r2d2 连接池访问独立的 `learn_analytics.db`，实现三个协作方接口。
//!
//! ## 表结构
//! - `questions`：题目（难度、知识点、课程）
//! - `student_answers`：作答记录（不设外键，允许孤立作答，由统计抽取丢弃）
//! - `class_resources`：课程资源
//! - `knowledge_point_resources`：知识点-资源多对多关联

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AnswerSource, QuestionStore, ResourceCatalog};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{
    Answer, AnswerRecord, KnowledgePointId, KnowledgePointResource, Question, QuestionId,
    QuestionScope, ResourceId, ResourceType, StudentId,
};

/// 数据库文件名
const DATABASE_FILENAME: &str = "learn_analytics.db";

/// IN 子句单批参数上限（低于 SQLite 旧版本的 999 限制）
const IN_CLAUSE_CHUNK: usize = 500;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY,
    course_id INTEGER,
    knowledge_point_id INTEGER NOT NULL,
    difficulty INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_questions_course ON questions(course_id);

CREATE TABLE IF NOT EXISTS student_answers (
    id INTEGER PRIMARY KEY,
    student_id INTEGER NOT NULL,
    question_id INTEGER NOT NULL,
    score REAL,
    max_score REAL,
    is_correct INTEGER
);
CREATE INDEX IF NOT EXISTS idx_student_answers_student ON student_answers(student_id);
CREATE INDEX IF NOT EXISTS idx_student_answers_question ON student_answers(question_id);

CREATE TABLE IF NOT EXISTS class_resources (
    id INTEGER PRIMARY KEY,
    type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS knowledge_point_resources (
    knowledge_point_id INTEGER NOT NULL,
    resource_id INTEGER NOT NULL REFERENCES class_resources(id) ON DELETE CASCADE,
    PRIMARY KEY (knowledge_point_id, resource_id)
);
"#;

const ANSWER_COLUMNS: &str = r#"
    a.id, a.student_id, a.question_id, a.score, a.max_score, a.is_correct,
    q.id, q.course_id, q.knowledge_point_id, q.difficulty
"#;

/// SQLite 连接池类型
pub type AnalyticsPool = Pool<SqliteConnectionManager>;

/// SQLite 池化连接类型
pub type AnalyticsPooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// SQLite 学习数据存储
pub struct SqliteLearningStore {
    pool: AnalyticsPool,
    db_path: Option<PathBuf>,
}

impl SqliteLearningStore {
    /// 在 `data_dir/databases/` 下打开（或创建）数据库
    pub fn new(data_dir: &Path) -> AnalyticsResult<Self> {
        info!(
            "[Analytics::SqliteStore] Initializing database in: {}",
            data_dir.display()
        );

        let databases_dir = data_dir.join("databases");
        fs::create_dir_all(&databases_dir).map_err(|e| {
            AnalyticsError::Io(format!("Failed to create databases directory: {}", e))
        })?;

        let db_path = databases_dir.join(DATABASE_FILENAME);
        let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "busy_timeout", 5000i64)?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(8)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600)))
            .build(manager)
            .map_err(|e| AnalyticsError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let store = Self {
            pool,
            db_path: Some(db_path),
        };
        store.init_schema()?;

        info!(
            "[Analytics::SqliteStore] Database ready: {}",
            databases_dir.join(DATABASE_FILENAME).display()
        );
        Ok(store)
    }

    /// 内存数据库（单连接，连接关闭即丢弃）
    pub fn open_in_memory() -> AnalyticsResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        });
        // 内存库随连接存亡，禁止连接池回收这唯一的连接
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .build(manager)
            .map_err(|e| AnalyticsError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let store = Self {
            pool,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> AnalyticsResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!("[Analytics::SqliteStore] Schema ensured");
        Ok(())
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> AnalyticsResult<AnalyticsPooledConnection> {
        self.pool
            .get()
            .map_err(|e| AnalyticsError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// 数据库文件路径（内存库为 None）
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // ========================================================================
    // 数据录入（课程系统同步 / 测试播种）
    // ========================================================================

    pub fn insert_question(&self, question: &Question) -> AnalyticsResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO questions (id, course_id, knowledge_point_id, difficulty)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                question.id,
                question.course_id,
                question.knowledge_point_id,
                question.difficulty
            ],
        )?;
        Ok(())
    }

    pub fn insert_answer(&self, answer: &Answer) -> AnalyticsResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO student_answers
                (id, student_id, question_id, score, max_score, is_correct)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                answer.id,
                answer.student_id,
                answer.question_id,
                answer.awarded_score,
                answer.max_score,
                answer.correct
            ],
        )?;
        Ok(())
    }

    pub fn upsert_resource(
        &self,
        resource_id: ResourceId,
        resource_type: ResourceType,
    ) -> AnalyticsResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO class_resources (id, type) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET type = excluded.type",
            params![resource_id, resource_type.as_str()],
        )?;
        Ok(())
    }

    pub fn link_resource(
        &self,
        knowledge_point_id: KnowledgePointId,
        resource_id: ResourceId,
    ) -> AnalyticsResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO knowledge_point_resources (knowledge_point_id, resource_id)
             VALUES (?1, ?2)",
            params![knowledge_point_id, resource_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // 行映射
    // ========================================================================

    fn row_to_record(row: &Row) -> rusqlite::Result<AnswerRecord> {
        let answer = Answer {
            id: row.get(0)?,
            student_id: row.get(1)?,
            question_id: row.get(2)?,
            awarded_score: row.get(3)?,
            max_score: row.get(4)?,
            correct: row.get(5)?,
        };

        let question_id: Option<QuestionId> = row.get(6)?;
        let question = match question_id {
            Some(id) => Some(Question {
                id,
                course_id: row.get(7)?,
                knowledge_point_id: row.get(8)?,
                difficulty: row.get(9)?,
            }),
            None => None,
        };

        Ok(AnswerRecord { answer, question })
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> AnalyticsResult<Vec<AnswerRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

impl AnswerSource for SqliteLearningStore {
    fn fetch_answers_for_student(
        &self,
        student_id: StudentId,
    ) -> AnalyticsResult<Vec<AnswerRecord>> {
        let sql = format!(
            "SELECT {} FROM student_answers a
             LEFT JOIN questions q ON q.id = a.question_id
             WHERE a.student_id = ?1
             ORDER BY a.id",
            ANSWER_COLUMNS
        );
        let records = self.query_records(&sql, params![student_id])?;
        debug!(
            "[Analytics::SqliteStore] Loaded {} answers for student {}",
            records.len(),
            student_id
        );
        Ok(records)
    }

    fn fetch_answers_by_scope(&self, scope: &QuestionScope) -> AnalyticsResult<Vec<AnswerRecord>> {
        match scope {
            QuestionScope::AllCourses => {
                let sql = format!(
                    "SELECT {} FROM student_answers a
                     LEFT JOIN questions q ON q.id = a.question_id
                     ORDER BY a.id",
                    ANSWER_COLUMNS
                );
                self.query_records(&sql, params![])
            }
            QuestionScope::Courses(course_ids) => {
                let mut records = Vec::new();
                for chunk in course_ids.chunks(IN_CLAUSE_CHUNK) {
                    let sql = format!(
                        "SELECT {} FROM student_answers a
                         JOIN questions q ON q.id = a.question_id
                         WHERE q.course_id IN ({})
                         ORDER BY a.id",
                        ANSWER_COLUMNS,
                        placeholders(chunk.len())
                    );
                    records.extend(self.query_records(&sql, params_from_iter(chunk.iter()))?);
                }
                // 多批结果合并后保持作答 ID 升序；同一课程不会跨批重复
                records.sort_by_key(|r| r.answer.id);
                records.dedup_by_key(|r| r.answer.id);
                Ok(records)
            }
        }
    }
}

impl ResourceCatalog for SqliteLearningStore {
    fn fetch_resources_for_knowledge_points(
        &self,
        knowledge_point_ids: &[KnowledgePointId],
    ) -> AnalyticsResult<Vec<KnowledgePointResource>> {
        let conn = self.get_conn()?;
        let mut links = Vec::new();

        for chunk in knowledge_point_ids.chunks(IN_CLAUSE_CHUNK) {
            let sql = format!(
                "SELECT kpr.knowledge_point_id, kpr.resource_id, r.type
                 FROM knowledge_point_resources kpr
                 JOIN class_resources r ON r.id = kpr.resource_id
                 WHERE kpr.knowledge_point_id IN ({})
                 ORDER BY kpr.knowledge_point_id, kpr.resource_id",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, KnowledgePointId>(0)?,
                    row.get::<_, ResourceId>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            for row in rows {
                let (knowledge_point_id, resource_id, type_str) = row?;
                match ResourceType::from_str(&type_str) {
                    Some(resource_type) => links.push(KnowledgePointResource {
                        knowledge_point_id,
                        resource_id,
                        resource_type,
                    }),
                    None => warn!(
                        "[Analytics::SqliteStore] Unknown resource type '{}' for resource {} (skipped)",
                        type_str, resource_id
                    ),
                }
            }
        }

        Ok(links)
    }
}

impl QuestionStore for SqliteLearningStore {
    fn fetch_question_by_id(&self, question_id: QuestionId) -> AnalyticsResult<Option<Question>> {
        let conn = self.get_conn()?;
        let question = conn
            .query_row(
                "SELECT id, course_id, knowledge_point_id, difficulty FROM questions WHERE id = ?1",
                params![question_id],
                |row| {
                    Ok(Question {
                        id: row.get(0)?,
                        course_id: row.get(1)?,
                        knowledge_point_id: row.get(2)?,
                        difficulty: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(question)
    }

    fn persist_question_difficulty(
        &self,
        question_id: QuestionId,
        new_difficulty: i32,
    ) -> AnalyticsResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE questions SET difficulty = ?2 WHERE id = ?1",
            params![question_id, new_difficulty],
        )?;
        if changed == 0 {
            return Err(AnalyticsError::question_not_found(question_id));
        }
        debug!(
            "[Analytics::SqliteStore] Question {} difficulty set to {}",
            question_id, new_difficulty
        );
        Ok(())
    }
}

// ============================================================================
// 单元测试
// ============================================================================
