//! Users, credentials and projects served by the HTTP routes.

mod password;
mod projects;
mod users;
mod validation;

pub use password::{hash_password, verify_password, PasswordError};
pub use projects::{
    MemoryProjects, NewProjectDto, PageLimits, Project, ProjectDto, ProjectId, ProjectQuery,
    ProjectRepository, ProjectSummaryDto, DEFAULT_PAGE_SIZE,
};
pub use users::{LoginDto, NewUserDto, User, UserDataDto, UsersService};
pub use validation::{is_email, Checker, Validate};
