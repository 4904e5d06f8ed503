pub mod grafanaalerthandler;
