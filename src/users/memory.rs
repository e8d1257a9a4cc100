use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::{
    repo::{RepoError, UserRepo},
    repo_types::{NewUser, Project, User},
};

#[derive(Default)]
struct Tables {
    projects: Vec<Project>,
    users: Vec<User>,
    next_project_id: i64,
    next_user_id: i64,
}

/// `UserRepo` kept entirely in process memory.
#[derive(Default)]
pub struct MemoryUserRepo {
    tables: RwLock<Tables>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_project(&self, name: &str) -> Project {
        let mut t = self.tables.write().await;
        t.next_project_id += 1;
        let project = Project {
            id: t.next_project_id,
            name: name.to_string(),
        };
        t.projects.push(project.clone());
        project
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn list(&self, project_name: Option<&str>) -> Result<Vec<User>, RepoError> {
        let t = self.tables.read().await;
        let users = match project_name {
            Some(name) => {
                let ids: Vec<i64> = t
                    .projects
                    .iter()
                    .filter(|p| p.name == name)
                    .map(|p| p.id)
                    .collect();
                t.users
                    .iter()
                    .filter(|u| u.project_id.is_some_and(|id| ids.contains(&id)))
                    .cloned()
                    .collect()
            }
            None => t.users.clone(),
        };
        Ok(users)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().any(|u| u.username == username))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::UsernameTaken);
        }
        t.next_user_id += 1;
        let created = User {
            id: t.next_user_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            position: user.position,
            phone: user.phone,
            password_hash: user.password_hash,
            last_login: None,
            date_joined: OffsetDateTime::now_utc(),
            project_id: user.project_id,
        };
        // ids only grow, so pushing keeps id order
        t.users.push(created.clone());
        Ok(created)
    }

    async fn touch_last_login(&self, id: i64, at: OffsetDateTime) -> Result<(), RepoError> {
        let mut t = self.tables.write().await;
        if let Some(u) = t.users.iter_mut().find(|u| u.id == id) {
            u.last_login = Some(at);
        }
        Ok(())
    }
}
