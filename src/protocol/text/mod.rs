mod init_db;
mod ping;
mod query;
mod quit;
mod row;

pub(crate) use init_db::InitDb;
pub(crate) use ping::Ping;
pub(crate) use query::ComQuery;
pub(crate) use quit::Quit;
pub(crate) use row::TextRow;
