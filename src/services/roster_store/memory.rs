//! In-process roster store for tests.
//!
//! Each transaction keeps its own overlay of touched records and reads
//! through to the committed tables, which gives read-committed visibility.
//! Natural keys of uncommitted classes are reserved so a second transaction
//! inserting the same key sees the duplicate condition.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Class, ClassKey, School, Student};
use crate::db::types::UserRole;

use super::{
    InsertOutcome, NewClass, NewStudent, Placement, RosterStore, RosterTx, StoreError,
    StudentChanges,
};

#[derive(Default)]
struct Shared {
    schools: HashMap<String, School>,
    members: HashMap<(String, String), UserRole>,
    classes: HashMap<String, Class>,
    students: HashMap<String, Student>,
    reserved_keys: HashSet<ClassKey>,
    competing_classes: Vec<Class>,
    failing_students: HashSet<String>,
    commits: usize,
    rollbacks: usize,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryRosterStore {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryRosterStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("roster store lock")
    }

    pub(crate) fn add_school(&self, school: School) {
        self.lock().schools.insert(school.id.clone(), school);
    }

    pub(crate) fn add_member(&self, school_id: &str, user_id: &str, role: UserRole) {
        self.lock().members.insert((school_id.to_string(), user_id.to_string()), role);
    }

    pub(crate) fn add_class(&self, class: Class) {
        self.lock().classes.insert(class.id.clone(), class);
    }

    pub(crate) fn add_student(&self, student: Student) {
        self.lock().students.insert(student.id.clone(), student);
    }

    pub(crate) fn class(&self, class_id: &str) -> Option<Class> {
        self.lock().classes.get(class_id).cloned()
    }

    pub(crate) fn student(&self, student_id: &str) -> Option<Student> {
        self.lock().students.get(student_id).cloned()
    }

    pub(crate) fn classes(&self) -> Vec<Class> {
        self.lock().classes.values().cloned().collect()
    }

    pub(crate) fn students(&self) -> Vec<Student> {
        self.lock().students.values().cloned().collect()
    }

    pub(crate) fn commits(&self) -> usize {
        self.lock().commits
    }

    pub(crate) fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    /// Commits `class` on behalf of another request just before the next
    /// insert of the same natural key, reproducing a lost creation race.
    pub(crate) fn commit_competing_class_before_insert(&self, class: Class) {
        self.lock().competing_classes.push(class);
    }

    /// Makes every write touching this student fail.
    pub(crate) fn fail_writes_for_student(&self, student_id: &str) {
        self.lock().failing_students.insert(student_id.to_string());
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn begin(&self) -> Result<Box<dyn RosterTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.shared),
            classes: HashMap::new(),
            students: HashMap::new(),
            reserved: Vec::new(),
            finished: false,
        }))
    }
}

struct MemoryTx {
    shared: Arc<Mutex<Shared>>,
    classes: HashMap<String, Option<Class>>,
    students: HashMap<String, Option<Student>>,
    reserved: Vec<ClassKey>,
    finished: bool,
}

impl MemoryTx {
    fn lock(&self) -> Result<MutexGuard<'_, Shared>, StoreError> {
        self.shared.lock().map_err(|_| StoreError::Backend("roster store poisoned".to_string()))
    }

    fn visible_class(&self, class_id: &str) -> Result<Option<Class>, StoreError> {
        if let Some(local) = self.classes.get(class_id) {
            return Ok(local.clone());
        }
        Ok(self.lock()?.classes.get(class_id).cloned())
    }

    fn visible_student(&self, student_id: &str) -> Result<Option<Student>, StoreError> {
        if let Some(local) = self.students.get(student_id) {
            return Ok(local.clone());
        }
        Ok(self.lock()?.students.get(student_id).cloned())
    }

    fn all_classes(&self) -> Result<Vec<Class>, StoreError> {
        let shared = self.lock()?;
        let mut ids: HashSet<&String> = shared.classes.keys().collect();
        ids.extend(self.classes.keys());
        Ok(ids
            .into_iter()
            .filter_map(|id| match self.classes.get(id) {
                Some(local) => local.clone(),
                None => shared.classes.get(id).cloned(),
            })
            .collect())
    }

    fn all_students(&self) -> Result<Vec<Student>, StoreError> {
        let shared = self.lock()?;
        let mut ids: HashSet<&String> = shared.students.keys().collect();
        ids.extend(self.students.keys());
        Ok(ids
            .into_iter()
            .filter_map(|id| match self.students.get(id) {
                Some(local) => local.clone(),
                None => shared.students.get(id).cloned(),
            })
            .collect())
    }

    fn existing_class(&self, class_id: &str) -> Result<Class, StoreError> {
        self.visible_class(class_id)?
            .ok_or_else(|| StoreError::Backend(format!("class {class_id} does not exist")))
    }

    fn writable_student(&self, student_id: &str) -> Result<Student, StoreError> {
        if self.lock()?.failing_students.contains(student_id) {
            return Err(StoreError::Backend(format!("write rejected for student {student_id}")));
        }
        self.visible_student(student_id)?
            .ok_or_else(|| StoreError::Backend(format!("student {student_id} does not exist")))
    }

    fn put_class(&mut self, mut class: Class) {
        class.updated_at = primitive_now_utc();
        self.classes.insert(class.id.clone(), Some(class));
    }

    fn put_student(&mut self, mut student: Student) {
        student.updated_at = primitive_now_utc();
        self.students.insert(student.id.clone(), Some(student));
    }

    fn release(&mut self, shared: &mut Shared) {
        for key in self.reserved.drain(..) {
            shared.reserved_keys.remove(&key);
        }
        self.finished = true;
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
        self.release(&mut guard);
    }
}

fn sort_classes(classes: &mut [Class]) {
    classes.sort_by(|a, b| {
        b.school_year
            .cmp(&a.school_year)
            .then(a.number.cmp(&b.number))
            .then(a.section.cmp(&b.section))
    });
}

fn sort_students(students: &mut [Student]) {
    students.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then(a.first_name.cmp(&b.first_name))
            .then(a.id.cmp(&b.id))
    });
}

#[async_trait]
impl RosterTx for MemoryTx {
    async fn school(&mut self, school_id: &str) -> Result<Option<School>, StoreError> {
        Ok(self.lock()?.schools.get(school_id).cloned())
    }

    async fn school_member_role(
        &mut self,
        school_id: &str,
        user_id: &str,
    ) -> Result<Option<UserRole>, StoreError> {
        let key = (school_id.to_string(), user_id.to_string());
        Ok(self.lock()?.members.get(&key).copied())
    }

    async fn class_by_id(&mut self, class_id: &str) -> Result<Option<Class>, StoreError> {
        self.visible_class(class_id)
    }

    async fn class_by_key(&mut self, key: &ClassKey) -> Result<Option<Class>, StoreError> {
        Ok(self.all_classes()?.into_iter().find(|class| &class.key() == key))
    }

    async fn insert_class(&mut self, class: NewClass) -> Result<InsertOutcome, StoreError> {
        {
            let mut shared = self.lock()?;
            if let Some(position) =
                shared.competing_classes.iter().position(|competing| competing.key() == class.key)
            {
                let competing = shared.competing_classes.remove(position);
                shared.classes.insert(competing.id.clone(), competing);
            }

            let committed = shared.classes.values().any(|existing| {
                existing.key() == class.key && !self.classes.contains_key(&existing.id)
            });
            let local = self.classes.values().flatten().any(|existing| existing.key() == class.key);
            let reserved_elsewhere =
                shared.reserved_keys.contains(&class.key) && !self.reserved.contains(&class.key);
            if committed || local || reserved_elsewhere {
                return Ok(InsertOutcome::Duplicate);
            }
            shared.reserved_keys.insert(class.key.clone());
        }
        self.reserved.push(class.key.clone());

        let created = Class {
            id: class.id,
            school_id: class.key.school_id,
            number: class.key.number,
            section: class.key.section,
            school_year: class.key.school_year,
            main_teacher_id: class.main_teacher_id.clone(),
            students: Vec::new(),
            teachers: vec![class.main_teacher_id],
            created_at: class.created_at,
            updated_at: class.created_at,
        };
        self.classes.insert(created.id.clone(), Some(created.clone()));
        Ok(InsertOutcome::Inserted(created))
    }

    async fn delete_class(&mut self, class_id: &str) -> Result<(), StoreError> {
        self.classes.insert(class_id.to_string(), None);
        Ok(())
    }

    async fn classes_for_teacher(
        &mut self,
        school_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<Class>, StoreError> {
        let mut classes: Vec<Class> = self
            .all_classes()?
            .into_iter()
            .filter(|class| class.school_id == school_id && class.is_managed_by(teacher_id))
            .collect();
        sort_classes(&mut classes);
        Ok(classes)
    }

    async fn add_class_student(
        &mut self,
        class_id: &str,
        student_id: &str,
    ) -> Result<bool, StoreError> {
        let mut class = self.existing_class(class_id)?;
        if class.has_student(student_id) {
            return Ok(false);
        }
        class.students.push(student_id.to_string());
        self.put_class(class);
        Ok(true)
    }

    async fn remove_class_student(
        &mut self,
        class_id: &str,
        student_id: &str,
    ) -> Result<bool, StoreError> {
        let mut class = self.existing_class(class_id)?;
        let before = class.students.len();
        class.students.retain(|id| id != student_id);
        let removed = class.students.len() != before;
        if removed {
            self.put_class(class);
        }
        Ok(removed)
    }

    async fn add_class_teacher(
        &mut self,
        class_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError> {
        let mut class = self.existing_class(class_id)?;
        if class.teachers.iter().any(|id| id == teacher_id) {
            return Ok(false);
        }
        class.teachers.push(teacher_id.to_string());
        self.put_class(class);
        Ok(true)
    }

    async fn remove_class_teacher(
        &mut self,
        class_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError> {
        let mut class = self.existing_class(class_id)?;
        let before = class.teachers.len();
        class.teachers.retain(|id| id != teacher_id);
        let removed = class.teachers.len() != before;
        if removed {
            self.put_class(class);
        }
        Ok(removed)
    }

    async fn student_by_id(&mut self, student_id: &str) -> Result<Option<Student>, StoreError> {
        self.visible_student(student_id)
    }

    async fn insert_student(&mut self, student: NewStudent) -> Result<Student, StoreError> {
        if self.lock()?.failing_students.contains(&student.id) {
            return Err(StoreError::Backend(format!("write rejected for student {}", student.id)));
        }
        let created = Student {
            id: student.id,
            school_id: student.school_id,
            first_name: student.first_name,
            last_name: student.last_name,
            gender: student.gender,
            birth_date: student.birth_date,
            class_id: None,
            class_number: None,
            section: None,
            school_year: None,
            note: student.note,
            track: student.track,
            tax_code: student.tax_code,
            teachers: vec![student.teacher_id],
            created_at: student.created_at,
            updated_at: student.created_at,
        };
        self.students.insert(created.id.clone(), Some(created.clone()));
        Ok(created)
    }

    async fn update_student(
        &mut self,
        student_id: &str,
        changes: &StudentChanges,
    ) -> Result<(), StoreError> {
        let mut student = self.writable_student(student_id)?;
        if let Some(first_name) = &changes.first_name {
            student.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            student.last_name = last_name.clone();
        }
        if let Some(gender) = changes.gender {
            student.gender = gender;
        }
        if let Some(birth_date) = changes.birth_date {
            student.birth_date = Some(birth_date);
        }
        if let Some(note) = &changes.note {
            student.note = note.clone();
        }
        if let Some(track) = &changes.track {
            student.track = Some(track.clone());
        }
        if let Some(tax_code) = &changes.tax_code {
            student.tax_code = Some(tax_code.clone());
        }
        self.put_student(student);
        Ok(())
    }

    async fn set_placement(
        &mut self,
        student_id: &str,
        placement: Option<&Placement>,
    ) -> Result<(), StoreError> {
        let mut student = self.writable_student(student_id)?;
        student.class_id = placement.map(|p| p.class_id.clone());
        student.class_number = placement.map(|p| p.class_number);
        student.section = placement.map(|p| p.section.clone());
        student.school_year = placement.map(|p| p.school_year.clone());
        self.put_student(student);
        Ok(())
    }

    async fn delete_student(&mut self, student_id: &str) -> Result<(), StoreError> {
        self.writable_student(student_id)?;
        self.students.insert(student_id.to_string(), None);
        Ok(())
    }

    async fn add_student_teacher(
        &mut self,
        student_id: &str,
        teacher_id: &str,
    ) -> Result<bool, StoreError> {
        let mut student = self.writable_student(student_id)?;
        if student.is_taught_by(teacher_id) {
            return Ok(false);
        }
        student.teachers.push(teacher_id.to_string());
        self.put_student(student);
        Ok(true)
    }

    async fn students_for_teacher(
        &mut self,
        school_id: &str,
        teacher_id: &str,
        class_id: Option<&str>,
    ) -> Result<Vec<Student>, StoreError> {
        let mut students: Vec<Student> = self
            .all_students()?
            .into_iter()
            .filter(|student| student.school_id == school_id && student.is_taught_by(teacher_id))
            .filter(|student| class_id.map_or(true, |id| student.class_id.as_deref() == Some(id)))
            .collect();
        sort_students(&mut students);
        Ok(students)
    }

    async fn unassigned_students(
        &mut self,
        school_id: &str,
        teacher_id: &str,
    ) -> Result<Vec<Student>, StoreError> {
        let mut students: Vec<Student> = self
            .all_students()?
            .into_iter()
            .filter(|student| {
                student.school_id == school_id
                    && student.needs_class()
                    && student.is_taught_by(teacher_id)
            })
            .collect();
        sort_students(&mut students);
        Ok(students)
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let shared = Arc::clone(&self.shared);
        let mut guard =
            shared.lock().map_err(|_| StoreError::Backend("roster store poisoned".to_string()))?;
        for (id, class) in self.classes.drain() {
            match class {
                Some(class) => guard.classes.insert(id, class),
                None => guard.classes.remove(&id),
            };
        }
        for (id, student) in self.students.drain() {
            match student {
                Some(student) => guard.students.insert(id, student),
                None => guard.students.remove(&id),
            };
        }
        guard.commits += 1;
        self.release(&mut guard);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        let shared = Arc::clone(&self.shared);
        let mut guard =
            shared.lock().map_err(|_| StoreError::Backend("roster store poisoned".to_string()))?;
        self.classes.clear();
        self.students.clear();
        guard.rollbacks += 1;
        self.release(&mut guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::roster::{self, MAIN_TEACHER, SCHOOL_ID, SCHOOL_YEAR};

    fn new_class(id: &str) -> NewClass {
        NewClass {
            id: id.to_string(),
            key: ClassKey {
                school_id: SCHOOL_ID.to_string(),
                number: 1,
                section: "A".to_string(),
                school_year: SCHOOL_YEAR.to_string(),
            },
            main_teacher_id: MAIN_TEACHER.to_string(),
            created_at: primitive_now_utc(),
        }
    }

    #[tokio::test]
    async fn dropping_an_open_transaction_frees_its_class_keys() {
        let store = roster::store();

        let mut abandoned = store.begin().await.unwrap();
        let first = abandoned.insert_class(new_class("class-first")).await.unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let mut competing = store.begin().await.unwrap();
        let blocked = competing.insert_class(new_class("class-blocked")).await.unwrap();
        assert!(matches!(blocked, InsertOutcome::Duplicate));
        competing.rollback().await.unwrap();

        drop(abandoned);

        let mut retry = store.begin().await.unwrap();
        let second = retry.insert_class(new_class("class-second")).await.unwrap();
        assert!(matches!(second, InsertOutcome::Inserted(_)));
        retry.commit().await.unwrap();

        assert!(store.class("class-first").is_none());
        assert!(store.class("class-second").is_some());
    }
}
