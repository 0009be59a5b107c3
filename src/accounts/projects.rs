//! Projects and their repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RepositoryError, ValidationErrors};
use crate::session::UserId;

use super::validation::{Checker, Validate};

pub type ProjectId = u64;

/// Default and maximum page size of project listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

// =============================================================================
// Model and DTOs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: UserId,
    pub name: String,
    pub tags: Vec<String>,
    pub short_description: String,
    pub long_description: String,
    pub github_link: String,
    pub skills: Vec<String>,
}

/// Payload for creating or replacing a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewProjectDto {
    pub name: String,
    pub tags: Vec<String>,
    pub long_description: String,
    pub short_description: String,
    pub github_link: String,
    pub skills: Vec<String>,
}

impl Validate for NewProjectDto {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut checker = Checker::new();
        checker
            .text("name", &self.name, 4, 32)
            .list("tags", &self.tags, (1, 6), (1, 40))
            .text("longDescription", &self.long_description, 200, 10_000)
            .text("shortDescription", &self.short_description, 10, 200)
            .required("githubLink", &self.github_link);
        checker.finish()
    }
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryDto {
    pub id: ProjectId,
    pub name: String,
    pub tags: Vec<String>,
    pub short_description: String,
    pub skills: Vec<String>,
}

impl From<&Project> for ProjectSummaryDto {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            tags: project.tags.clone(),
            short_description: project.short_description.clone(),
            skills: project.skills.clone(),
        }
    }
}

/// Full project view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: ProjectId,
    pub name: String,
    pub tags: Vec<String>,
    pub short_description: String,
    #[serde(rename = "fullDescription")]
    pub long_description: String,
    pub github_link: String,
}

impl From<&Project> for ProjectDto {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            tags: project.tags.clone(),
            short_description: project.short_description.clone(),
            long_description: project.long_description.clone(),
            github_link: project.github_link.clone(),
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Page size bounds for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_size: usize,
    pub max_size: usize,
}

impl PageLimits {
    pub fn new(max_size: usize) -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE.min(max_size),
            max_size,
        }
    }

    /// Effective page size. Missing and out-of-range requests get the default.
    pub fn page_size(&self, requested: Option<i64>) -> usize {
        match requested.and_then(|n| usize::try_from(n).ok()) {
            Some(size) if (1..=self.max_size).contains(&size) => size,
            _ => self.default_size,
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// One page of a listing. `page_offset` counts pages, not items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectQuery {
    pub page_size: usize,
    pub page_offset: usize,
    /// Projects carrying at least one of these tags; empty matches all
    pub tags: Vec<String>,
    /// Projects asking for at least one of these skills; empty matches all
    pub skills: Vec<String>,
}

fn overlaps(wanted: &[String], present: &[String]) -> bool {
    wanted.is_empty() || present.iter().any(|item| wanted.contains(item))
}

impl ProjectQuery {
    fn matches(&self, project: &Project) -> bool {
        overlaps(&self.tags, &project.tags) && overlaps(&self.skills, &project.skills)
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Project persistence.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, owner_id: UserId, project: NewProjectDto) -> Result<Project, RepositoryError>;

    async fn get(&self, id: ProjectId) -> Result<Project, RepositoryError>;

    /// Newest projects first.
    async fn list(&self, query: &ProjectQuery) -> Result<Vec<Project>, RepositoryError>;

    /// Replace the editable fields of project `id`.
    async fn update(&self, id: ProjectId, project: NewProjectDto) -> Result<Project, RepositoryError>;
}

#[derive(Debug, Default)]
struct Catalog {
    projects: BTreeMap<ProjectId, Project>,
    next_id: ProjectId,
}

/// In-memory [`ProjectRepository`]. Ids grow with creation order.
#[derive(Debug, Default)]
pub struct MemoryProjects {
    catalog: RwLock<Catalog>,
}

impl MemoryProjects {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: ProjectId) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "project",
        id: id.to_string(),
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjects {
    async fn create(&self, owner_id: UserId, project: NewProjectDto) -> Result<Project, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        catalog.next_id += 1;

        let project = Project {
            id: catalog.next_id,
            owner_id,
            name: project.name,
            tags: project.tags,
            short_description: project.short_description,
            long_description: project.long_description,
            github_link: project.github_link,
            skills: project.skills,
        };
        catalog.projects.insert(project.id, project.clone());

        debug!(project_id = project.id, owner_id, "Project created");
        Ok(project)
    }

    async fn get(&self, id: ProjectId) -> Result<Project, RepositoryError> {
        self.catalog
            .read()
            .await
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self, query: &ProjectQuery) -> Result<Vec<Project>, RepositoryError> {
        debug!(
            page_size = query.page_size,
            page_offset = query.page_offset,
            tags = ?query.tags,
            "Listing projects"
        );

        let catalog = self.catalog.read().await;
        let page: Vec<Project> = catalog
            .projects
            .values()
            .rev()
            .filter(|project| query.matches(project))
            .skip(query.page_offset.saturating_mul(query.page_size))
            .take(query.page_size)
            .cloned()
            .collect();

        debug!("Found {} projects", page.len());
        Ok(page)
    }

    async fn update(&self, id: ProjectId, update: NewProjectDto) -> Result<Project, RepositoryError> {
        let mut catalog = self.catalog.write().await;
        let project = catalog.projects.get_mut(&id).ok_or_else(|| not_found(id))?;

        project.name = update.name;
        project.tags = update.tags;
        project.short_description = update.short_description;
        project.long_description = update.long_description;
        project.github_link = update.github_link;
        project.skills = update.skills;

        debug!(project_id = id, "Project updated");
        Ok(project.clone())
    }
}
