use crate::model::{Role, StudentProfile};

/// Class labels that mark staff accounts.
const ADMIN_CLASS_LABELS: &[&str] = &["教师", "管理员"];

/// Admin when the stored role is `admin` or the class label is a staff label.
pub fn resolve_role(profile: &StudentProfile) -> Role {
    if profile.role == Some(Role::Admin) || ADMIN_CLASS_LABELS.contains(&profile.class.trim()) {
        Role::Admin
    } else {
        Role::Student
    }
}
