//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod allocation;
pub mod class;
pub mod otp_code;
pub mod prior_roster;
pub mod registration;
pub mod section;
pub mod section_teacher;
pub mod session;
pub mod system_state;
pub mod teacher;

// Re-export specific types to avoid conflicts
pub use allocation::{Column as AllocationColumn, Entity as Allocation, Model as AllocationModel};
pub use class::{Column as ClassColumn, Entity as Class, Model as ClassModel};
pub use otp_code::{Column as OtpCodeColumn, Entity as OtpCode, Model as OtpCodeModel};
pub use prior_roster::{
    Column as PriorRosterColumn, Entity as PriorRoster, Model as PriorRosterModel,
};
pub use registration::{
    Column as RegistrationColumn, Entity as Registration, Model as RegistrationModel,
};
pub use section::{Column as SectionColumn, Entity as Section, Model as SectionModel};
pub use section_teacher::{
    Column as SectionTeacherColumn, Entity as SectionTeacher, Model as SectionTeacherModel,
};
pub use session::{Column as SessionColumn, Entity as Session, Model as SessionModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use teacher::{Column as TeacherColumn, Entity as Teacher, Model as TeacherModel};
