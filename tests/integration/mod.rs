mod helpers;
mod test_finalize;
