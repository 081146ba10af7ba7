//! Demo data for empty installations.

use chrono::Duration;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashSet;

use super::clock::{format_timestamp, Clock};
use super::domain::{RequestStatus, Role, Subject, User};
use super::identifiers::fresh_identifier;
use crate::email::derive_email;

/// Demo student that owns the first seeded requests.
pub const DEMO_STUDENT_ID: &str = "213233430";
pub const DEMO_STUDENT_PASSWORD: &str = "213213";
pub const DEMO_STUDENT_NAME: &str = "נועם אברהמי";
pub const DEMO_ADMIN_ID: &str = "214305047";
pub const DEMO_ADMIN_PASSWORD: &str = "123123";
pub const DEMO_ADMIN_NAME: &str = "ישראל כהן";

const SEED_REQUEST_COUNT: usize = 15;
const DEMO_STUDENT_REQUESTS: usize = 3;

const REQUEST_NAMES: [&str; 15] = [
    "ישראל כהן",
    "דוד לוי",
    "נועה ישראלי",
    "רון מזרחי",
    "מיה בר",
    "שיר אלון",
    "אורי שמואלי",
    "עדי פרידמן",
    "לי קימחי",
    "איתי סבן",
    "אדל בר",
    "אליטה כהן",
    "מיכל לוי",
    "דני ישראלי",
    "רותם מזרחי",
];

const REQUEST_DESCRIPTIONS: [&str; 15] = [
    "בעיה בהתחברות למערכת הלימודים",
    "שאלה לגבי ציונים בקורס מתמטיקה",
    "בקשה לעזרה טכנית במחשב",
    "פנייה לגבי לוח זמנים של בחינות",
    "בעיה בהעלאת קובץ למטלה",
    "שאלה על חומר לימוד",
    "בקשה להארכת מועד הגשה",
    "בעיה בהדפסת מסמכים",
    "שאלה על נוכחות בשיעורים",
    "בקשה למידע על מלגות",
    "בעיה בגישה לספרייה הדיגיטלית",
    "שאלה על תכנית הלימודים",
    "בקשה לפגישה עם יועץ",
    "בעיה בהזמנת חדר לימוד",
    "שאלה על תשלום שכר לימוד",
];

const ADMIN_CLOSING_REPLY: &str = "הפנייה טופלה בהצלחה. תודה על הפנייה.";

const USER_ROSTER: [(&str, Role); 6] = [
    ("ישראל כהן", Role::Admin),
    ("דוד לוי", Role::Student),
    ("נועה ישראלי", Role::Admin),
    ("רון מזרחי", Role::Student),
    ("מיה בר", Role::Student),
    ("שיר אלון", Role::Student),
];

fn seed_status<R: Rng + ?Sized>(index: usize, rng: &mut R) -> RequestStatus {
    match index {
        i if i < DEMO_STUDENT_REQUESTS => RequestStatus::Open,
        i if i < 7 => RequestStatus::InProgress,
        _ if rng.gen_bool(0.5) => RequestStatus::Closed,
        _ => RequestStatus::InProgress,
    }
}

/// Fifteen demo requests; the first three belong to [`DEMO_STUDENT_ID`].
pub fn seed_requests<R: Rng + ?Sized>(rng: &mut R, clock: &dyn Clock) -> Vec<Value> {
    let now = clock.now();
    let created_at = format_timestamp(now);
    let mut taken: HashSet<String> = HashSet::from([DEMO_STUDENT_ID.to_string()]);

    (0..SEED_REQUEST_COUNT)
        .map(|index| {
            let name = REQUEST_NAMES[index % REQUEST_NAMES.len()];
            let id_number = if index < DEMO_STUDENT_REQUESTS {
                DEMO_STUDENT_ID.to_string()
            } else {
                fresh_identifier(rng, &mut taken)
            };
            let role = if rng.gen_bool(0.2) {
                Role::Admin
            } else {
                Role::Student
            };
            let status = seed_status(index, rng);
            let subject = Subject::ordered()[index % Subject::ordered().len()];
            let details = REQUEST_DESCRIPTIONS
                .get(index)
                .copied()
                .unwrap_or_else(|| subject.placeholder());

            let hours_ago = Duration::hours(index as i64 + 1);
            let mut conversation = vec![json!({
                "sender": Role::Student.label(),
                "text": details,
                "timestamp": (now - hours_ago).timestamp_millis(),
            })];
            if status == RequestStatus::Closed && rng.gen_bool(0.5) {
                let half_hours_ago = Duration::minutes(30 * (index as i64 + 1));
                conversation.push(json!({
                    "sender": Role::Admin.label(),
                    "text": ADMIN_CLOSING_REPLY,
                    "timestamp": (now - half_hours_ago).timestamp_millis(),
                }));
            }

            json!({
                "idNumber": id_number,
                "name": name,
                "email": derive_email(name),
                "role": role.label(),
                "status": status.label(),
                "subject": subject.label(),
                "details": details,
                "attachments": [],
                "createdAt": created_at,
                "updatedAt": created_at,
                "conversation": conversation,
            })
        })
        .collect()
}

fn user(id_number: String, full_name: &str, role: Role, password: Option<&str>, at: &str) -> User {
    User {
        id_number,
        full_name: full_name.to_string(),
        email: derive_email(full_name),
        role,
        password: password.map(str::to_string),
        is_active: true,
        created_at: at.to_string(),
        updated_at: at.to_string(),
    }
}

/// The two demo accounts, which can log in.
pub fn demo_users(clock: &dyn Clock) -> Vec<User> {
    let at = clock.timestamp();
    vec![
        user(
            DEMO_ADMIN_ID.to_string(),
            DEMO_ADMIN_NAME,
            Role::Admin,
            Some(DEMO_ADMIN_PASSWORD),
            &at,
        ),
        user(
            DEMO_STUDENT_ID.to_string(),
            DEMO_STUDENT_NAME,
            Role::Student,
            Some(DEMO_STUDENT_PASSWORD),
            &at,
        ),
    ]
}

/// Demo accounts followed by a roster of users without passwords.
pub fn seed_users<R: Rng + ?Sized>(rng: &mut R, clock: &dyn Clock) -> Vec<User> {
    let at = clock.timestamp();
    let mut users = demo_users(clock);
    let mut taken: HashSet<String> = users.iter().map(|u| u.id_number.clone()).collect();

    users.extend(USER_ROSTER.iter().map(|(name, role)| {
        user(fresh_identifier(rng, &mut taken), name, *role, None, &at)
    }));
    users
}
