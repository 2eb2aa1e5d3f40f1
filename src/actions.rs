use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};

use crate::models;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Lets concurrent writers wait on the SQLite lock instead of failing.
#[derive(Debug)]
struct BusyTimeout;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for BusyTimeout {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn build_pool(database_url: &str) -> Result<DbPool, r2d2::PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .connection_customizer(Box::new(BusyTimeout))
        .build(manager)
}

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS members (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        address TEXT NOT NULL,
        phone TEXT NOT NULL,
        aadhaar TEXT NOT NULL,
        occupation TEXT NOT NULL,
        dob DATE NOT NULL,
        photo TEXT,
        exp DOUBLE NOT NULL
    );
    CREATE TABLE IF NOT EXISTS photos (
        name TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        mime_type TEXT NOT NULL
    );
";

pub fn create_tables(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.batch_execute(CREATE_TABLES)
}

pub fn insert_member(
    new_member: &models::Member,
    conn: &mut SqliteConnection,
) -> Result<(), diesel::result::Error> {
    use crate::schema::members::dsl::*;

    diesel::insert_into(members).values(new_member).execute(conn)?;
    Ok(())
}

pub fn list_members(
    conn: &mut SqliteConnection,
) -> Result<Vec<models::Member>, diesel::result::Error> {
    use crate::schema::members::dsl::*;

    members.select(models::Member::as_select()).load(conn)
}

pub fn insert_photo(
    new_photo: &models::Photo,
    conn: &mut SqliteConnection,
) -> Result<(), diesel::result::Error> {
    use crate::schema::photos::dsl::*;

    diesel::insert_into(photos).values(new_photo).execute(conn)?;
    Ok(())
}

pub fn find_photo_by_name(
    search_name: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<models::Photo>, diesel::result::Error> {
    use crate::schema::photos::dsl::*;

    photos
        .filter(name.eq(search_name))
        .select(models::Photo::as_select())
        .first(conn)
        .optional()
}

/// Removes every member and every photo, returning how many of each went.
pub fn delete_all(conn: &mut SqliteConnection) -> Result<(usize, usize), diesel::result::Error> {
    use crate::schema::{members, photos};

    let deleted_members = diesel::delete(members::table).execute(conn)?;
    let deleted_photos = diesel::delete(photos::table).execute(conn)?;
    Ok((deleted_members, deleted_photos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn connection() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        create_tables(&mut conn).unwrap();
        conn
    }

    fn member(id: &str, photo: Option<&str>) -> models::Member {
        models::Member {
            id: id.to_string(),
            name: "Asha Rao".to_string(),
            address: "12 Lake Road".to_string(),
            phone: "9800000000".to_string(),
            aadhaar: "1234 5678 9012".to_string(),
            occupation: "Carpenter".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
            photo: photo.map(str::to_string),
            exp: 7.0,
        }
    }

    #[test]
    fn members_are_listed_after_insert() {
        let mut conn = connection();
        insert_member(&member("a", None), &mut conn).unwrap();
        insert_member(&member("b", Some("abc.png")), &mut conn).unwrap();

        let listed = list_members(&mut conn).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&member("b", Some("abc.png"))));
    }

    #[test]
    fn photo_lookup_by_name() {
        let mut conn = connection();
        let photo = models::Photo {
            name: "abc.png".to_string(),
            value: "iVBORw==".to_string(),
            mime_type: "image/png".to_string(),
        };
        insert_photo(&photo, &mut conn).unwrap();

        let found = find_photo_by_name("abc.png", &mut conn).unwrap().unwrap();
        assert_eq!(found.value, "iVBORw==");
        assert_eq!(found.mime_type, "image/png");
        assert!(find_photo_by_name("missing.png", &mut conn).unwrap().is_none());
    }

    #[test]
    fn photo_names_are_unique() {
        let mut conn = connection();
        let photo = models::Photo {
            name: "abc.png".to_string(),
            value: String::new(),
            mime_type: "image/png".to_string(),
        };
        insert_photo(&photo, &mut conn).unwrap();
        assert!(insert_photo(&photo, &mut conn).is_err());
    }

    #[test]
    fn delete_all_reports_counts() {
        let mut conn = connection();
        insert_member(&member("a", None), &mut conn).unwrap();
        insert_member(&member("b", None), &mut conn).unwrap();
        insert_photo(
            &models::Photo {
                name: "x.jpg".to_string(),
                value: String::new(),
                mime_type: "image/jpeg".to_string(),
            },
            &mut conn,
        )
        .unwrap();

        assert_eq!(delete_all(&mut conn).unwrap(), (2, 1));
        assert!(list_members(&mut conn).unwrap().is_empty());
        assert!(find_photo_by_name("x.jpg", &mut conn).unwrap().is_none());
    }
}
